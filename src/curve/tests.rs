use approx::assert_relative_eq;
use nalgebra::{Point3, Point4};

use crate::curve::NurbsCurve3D;
use crate::misc::Invertible;

#[test]
fn double_reverse_round_trip() {
    let poles = [
        Point3::new(0., 0., 0.),
        Point3::new(1., 2., 0.),
        Point3::new(3., 2., 1.),
        Point3::new(4., 0., 0.),
    ];
    let weights = [1., 2., 0.5, 1.];
    let curve =
        NurbsCurve3D::try_from_poles_mults_knots(3, &poles, &weights, &[0., 1.], &[4, 4], false)
            .unwrap();
    assert!(curve.is_rational());
    assert!(curve.is_clamped());

    let round_trip = curve.inverted().inverted();
    assert_eq!(curve.knots(), round_trip.knots());
    assert_eq!(curve.control_points(), round_trip.control_points());
    assert_eq!(curve.weights(), round_trip.weights());

    // a single reversal flips the pole order and keeps the curve clamped
    let reversed = curve.inverted();
    assert!(reversed.is_clamped());
    assert_relative_eq!(
        reversed.dehomogenized_control_points()[0],
        poles[3],
        epsilon = 1e-12
    );
}

#[test]
fn scaled_knots_preserve_geometry() {
    let curve = NurbsCurve3D::polyline(&[
        Point3::new(0., 0., 0.),
        Point3::new(2., 0., 0.),
        Point3::new(2., 2., 0.),
    ]);
    assert_eq!(curve.knots_domain(), (0., 4.));

    let scaled = curve.try_scaled_knots(1.).unwrap();
    assert_eq!(scaled.knots_domain(), (0., 1.));
    assert_relative_eq!(scaled.point_at(0.5), curve.point_at(2.), epsilon = 1e-12);
    assert_relative_eq!(
        scaled.try_length().unwrap(),
        curve.try_length().unwrap(),
        epsilon = 1e-9
    );
}

#[test]
fn degenerate_knot_range_is_rejected() {
    let curve = NurbsCurve3D::try_new(
        1,
        vec![Point4::new(0., 0., 0., 1.), Point4::new(1., 0., 0., 1.)],
        vec![1., 1., 1., 1.],
    )
    .unwrap();
    assert!(curve.try_scaled_knots(2.).is_err());
    assert!(curve.try_length().is_err());
}

#[test]
fn closest_parameter_on_a_line() {
    let line = NurbsCurve3D::polyline(&[Point3::new(0., 0., 0.), Point3::new(2., 0., 0.)]);
    let u = line
        .find_closest_parameter(&Point3::new(0.5, 1., 0.))
        .unwrap();
    assert_relative_eq!(u, 0.5, epsilon = 1e-6);

    let p = line.find_closest_point(&Point3::new(1.5, -2., 0.)).unwrap();
    assert_relative_eq!(p, Point3::new(1.5, 0., 0.), epsilon = 1e-6);
}

#[test]
fn polyline_interpolates_its_points() {
    let points = [
        Point3::new(0., 0., 0.),
        Point3::new(3., 4., 0.),
        Point3::new(3., 4., 5.),
    ];
    let curve = NurbsCurve3D::polyline(&points);
    assert_eq!(curve.degree(), 1);
    assert!(!curve.is_rational());
    // chord length parameterized: the second point sits at its distance
    assert_relative_eq!(curve.point_at(5.), points[1], epsilon = 1e-12);
    assert_relative_eq!(curve.try_length().unwrap(), 10., epsilon = 1e-9);
}

#[test]
fn invalid_definitions_are_rejected() {
    let poles = [
        Point3::new(0., 0., 0.),
        Point3::new(1., 1., 0.),
        Point3::new(2., 1., 0.),
        Point3::new(3., 0., 0.),
    ];

    // mismatched weight count
    assert!(NurbsCurve3D::try_from_poles_mults_knots(
        3,
        &poles,
        &[1., 1., 1.],
        &[0., 1.],
        &[4, 4],
        false
    )
    .is_err());

    // non-positive weight
    assert!(NurbsCurve3D::try_from_poles_mults_knots(
        3,
        &poles,
        &[1., 0., 1., 1.],
        &[0., 1.],
        &[4, 4],
        false
    )
    .is_err());

    // degree not below the pole count
    assert!(NurbsCurve3D::try_from_poles_mults_knots(
        4,
        &poles,
        &[1., 1., 1., 1.],
        &[0., 1.],
        &[5, 5],
        false
    )
    .is_err());

    // non-periodic curve without clamped ends
    assert!(NurbsCurve3D::try_from_poles_mults_knots(
        3,
        &poles,
        &[1., 1., 1., 1.],
        &[0., 0.5, 1.],
        &[4, 1, 3],
        false
    )
    .is_err());

    // decreasing knots
    assert!(NurbsCurve3D::try_from_poles_mults_knots(
        3,
        &poles,
        &[1., 1., 1., 1.],
        &[1., 0.],
        &[4, 4],
        false
    )
    .is_err());
}

#[test]
fn set_poles_keeps_weights() {
    let poles = [
        Point3::new(0., 0., 0.),
        Point3::new(1., 1., 0.),
        Point3::new(2., 1., 0.),
        Point3::new(3., 0., 0.),
    ];
    let weights = [1., 3., 3., 1.];
    let mut curve =
        NurbsCurve3D::try_from_poles_mults_knots(3, &poles, &weights, &[0., 1.], &[4, 4], false)
            .unwrap();

    let moved: Vec<_> = poles
        .iter()
        .map(|p| Point3::new(p.x, p.y + 1., p.z))
        .collect();
    curve.try_set_poles(&moved).unwrap();

    assert_eq!(curve.weights(), weights.to_vec());
    assert_relative_eq!(
        curve.dehomogenized_control_points()[1],
        Point3::new(1., 2., 0.),
        epsilon = 1e-12
    );

    // pole count must stay consistent
    assert!(curve.try_set_poles(&moved[1..]).is_err());
}
