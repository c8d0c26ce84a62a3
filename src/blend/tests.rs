use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};

use crate::blend::{BlendCurve, BlendEnd, BlendWarning, CurveMatchOption};
use crate::curve::NurbsCurve3D;

fn line(a: Point3<f64>, b: Point3<f64>) -> NurbsCurve3D<f64> {
    NurbsCurve3D::polyline(&[a, b])
}

fn cubic(poles: &[Point3<f64>]) -> NurbsCurve3D<f64> {
    let weights = vec![1.; poles.len()];
    let nb_int_knots = poles.len() - 4;
    let knots: Vec<_> = (0..=nb_int_knots + 1).map(|k| k as f64).collect();
    let mut mults = vec![1; nb_int_knots + 2];
    mults[0] = 4;
    mults[nb_int_knots + 1] = 4;
    NurbsCurve3D::try_from_poles_mults_knots(3, poles, &weights, &knots, &mults, false).unwrap()
}

#[test]
fn match_at_level_zero_reproduces_position() {
    let reference = line(Point3::new(0., 0., 0.), Point3::new(2., 0., 0.));
    let target = cubic(&[
        Point3::new(5., 5., 0.),
        Point3::new(6., 5., 0.),
        Point3::new(7., 6., 0.),
        Point3::new(8., 5., 0.),
    ]);

    let matched = target
        .try_match_end(&reference, CurveMatchOption::new(1.))
        .unwrap();
    assert_eq!(matched.achieved(), 0);
    assert!(matched.is_complete());

    let poles = matched.curve().dehomogenized_control_points();
    assert_relative_eq!(poles[0], reference.point_at(1.), epsilon = 1e-6);
    // the remaining poles keep their initial values
    assert_relative_eq!(poles[1], Point3::new(6., 5., 0.), epsilon = 1e-12);
    assert_relative_eq!(poles[2], Point3::new(7., 6., 0.), epsilon = 1e-12);
    assert_relative_eq!(poles[3], Point3::new(8., 5., 0.), epsilon = 1e-12);
}

#[test]
fn match_rejects_a_zero_scale() {
    let reference = line(Point3::new(0., 0., 0.), Point3::new(2., 0., 0.));
    let target = cubic(&[
        Point3::new(5., 5., 0.),
        Point3::new(6., 5., 0.),
        Point3::new(7., 6., 0.),
        Point3::new(8., 5., 0.),
    ]);
    assert!(target
        .try_match_end(&reference, CurveMatchOption::new(1.).with_scale(0.))
        .is_err());
}

#[test]
fn lower_order_poles_are_stable_across_levels() {
    let reference = cubic(&[
        Point3::new(0., 0., 0.),
        Point3::new(1., 1., 0.),
        Point3::new(2., -1., 0.),
        Point3::new(3., 0., 0.),
    ]);
    let target = cubic(&[
        Point3::new(4., 0., 0.),
        Point3::new(5., 0., 0.),
        Point3::new(6., 1., 0.),
        Point3::new(7., 0., 0.),
        Point3::new(8., 0., 0.),
    ]);

    let option = CurveMatchOption::new(0.7);
    let high = target
        .try_match_end(&reference, option.with_continuity(2))
        .unwrap();
    let low = target
        .try_match_end(&reference, option.with_continuity(1))
        .unwrap();
    assert_eq!(high.achieved(), 2);
    assert_eq!(low.achieved(), 1);

    let high_poles = high.curve().dehomogenized_control_points();
    let low_poles = low.curve().dehomogenized_control_points();
    // poles below the requested level do not depend on it
    for i in 0..2 {
        assert_relative_eq!(high_poles[i], low_poles[i], epsilon = 1e-9);
    }
    // pole 2 was only solved by the higher order run
    assert!((high_poles[2] - low_poles[2]).norm() > 1e-6);
}

#[test]
fn blend_between_parallel_lines() {
    let e1 = line(Point3::new(0., 0., 0.), Point3::new(1., 0., 0.));
    let e2 = line(Point3::new(2., 1., 0.), Point3::new(3., 1., 0.));

    let mut blend = BlendCurve::new(&e1, &e2);
    blend.set_param1(1.);
    blend.set_param2(0.);
    blend.set_cont1(1);
    blend.set_cont2(1);

    let curve = blend.curve().unwrap().clone();
    assert_eq!(curve.degree(), 3);
    assert_eq!(curve.control_points().len(), 4);

    let (start, end) = curve.knots_domain();
    assert_relative_eq!(curve.point_at(start), Point3::new(1., 0., 0.), epsilon = 1e-6);
    assert_relative_eq!(curve.point_at(end), Point3::new(2., 1., 0.), epsilon = 1e-6);

    // leaves the first edge along its direction
    let start_tangent = curve.tangent_at(start).normalize();
    assert_relative_eq!(start_tangent, Vector3::new(1., 0., 0.), epsilon = 1e-6);

    // arrives at the second edge collinear with it
    let end_tangent = curve.tangent_at(end).normalize();
    assert_relative_eq!(end_tangent.y, 0., epsilon = 1e-6);
    assert_relative_eq!(end_tangent.z, 0., epsilon = 1e-6);

    assert!(blend.warnings().is_empty());
}

#[test]
fn straight_blend_between_coincident_directions() {
    // cont 0 on both ends degenerates to a two pole connector
    let e1 = line(Point3::new(0., 0., 0.), Point3::new(1., 0., 0.));
    let e2 = line(Point3::new(3., 0., 0.), Point3::new(4., 0., 0.));

    let mut blend = BlendCurve::new(&e1, &e2);
    blend.set_param1(1.);

    let poles = blend.poles().unwrap();
    assert_eq!(poles.len(), 2);
    assert_relative_eq!(poles[0], Point3::new(1., 0., 0.), epsilon = 1e-6);
    assert_relative_eq!(poles[1], Point3::new(3., 0., 0.), epsilon = 1e-6);
}

#[test]
fn negative_scale_reverses_the_blend_direction() {
    let e1 = line(Point3::new(0., 0., 0.), Point3::new(1., 0., 0.));
    let e2 = line(Point3::new(2., 1., 0.), Point3::new(3., 1., 0.));

    let mut blend = BlendCurve::new(&e1, &e2);
    blend.set_param1(1.);
    blend.set_cont1(1);
    blend.set_cont2(1);
    blend.set_scale1(-1.);

    let curve = blend.curve().unwrap().clone();
    let (start, _) = curve.knots_domain();
    let start_tangent = curve.tangent_at(start).normalize();
    assert_relative_eq!(start_tangent, Vector3::new(-1., 0., 0.), epsilon = 1e-6);
}

#[test]
fn zero_chord_is_clamped() {
    let e1 = line(Point3::new(0., 0., 0.), Point3::new(1., 0., 0.));
    let e2 = line(Point3::new(1., 0., 0.), Point3::new(2., 0., 0.));

    let mut blend = BlendCurve::new(&e1, &e2);
    blend.set_param1(1.);
    blend.set_cont1(1);
    blend.set_cont2(1);

    blend.compute().unwrap();
    assert_relative_eq!(blend.chord_length(), 1.);
    assert!(blend
        .warnings()
        .iter()
        .any(|w| matches!(w, BlendWarning::ZeroChordLength { .. })));

    let poles = blend.poles().unwrap();
    assert_eq!(poles.len(), 4);
    assert_relative_eq!(poles[0], Point3::new(1., 0., 0.), epsilon = 1e-6);
}

#[test]
fn degree_clamp_is_surfaced() {
    let e1 = line(Point3::new(0., 0., 0.), Point3::new(1., 0., 0.));
    let e2 = line(Point3::new(2., 1., 0.), Point3::new(3., 1., 0.));

    let mut blend = BlendCurve::new(&e1, &e2);
    blend.set_param1(1.);
    blend.set_cont1(2);
    blend.set_cont2(2);
    blend.set_max_degree(3);

    blend.compute().unwrap();
    {
        let curve = blend.curve().unwrap();
        assert_eq!(curve.degree(), 3);
        assert_eq!(curve.control_points().len(), 6);
    }
    assert!(blend.warnings().iter().any(|w| matches!(
        w,
        BlendWarning::DegreeClamped {
            requested: 5,
            clamped: 3
        }
    )));

    // strict mode turns the clamp into a hard error
    blend.set_strict(true);
    assert!(blend.compute().is_err());
}

#[test]
fn truncated_continuity_is_surfaced() {
    let e1 = line(Point3::new(0., 0., 0.), Point3::new(1., 0., 0.));
    let e2 = line(Point3::new(2., 1., 0.), Point3::new(3., 1., 0.));

    let mut blend = BlendCurve::new(&e1, &e2);
    blend.set_param1(1.);
    blend.set_cont1(2);
    // a degree 1 representation cannot carry a second derivative
    blend.set_max_degree(1);

    blend.compute().unwrap();
    assert!(blend.warnings().iter().any(|w| matches!(
        w,
        BlendWarning::ContinuityTruncated {
            end: BlendEnd::Start,
            requested: 2,
            achieved: 1
        }
    )));
}

#[test]
fn recompute_only_after_input_changes() {
    let e1 = line(Point3::new(0., 0., 0.), Point3::new(1., 0., 0.));
    let e2 = line(Point3::new(2., 1., 0.), Point3::new(3., 1., 0.));

    let mut blend = BlendCurve::new(&e1, &e2);
    blend.set_param1(1.);
    blend.set_cont1(1);
    blend.set_cont2(1);

    let first = blend.poles().unwrap();
    let again = blend.poles().unwrap();
    assert_eq!(first, again);

    blend.set_scale1(2.);
    let rescaled = blend.poles().unwrap();
    // a stronger pull moves the inner pole further along the tangent
    assert!(rescaled[1].x > first[1].x);
    assert_relative_eq!(rescaled[0], first[0], epsilon = 1e-12);
}
