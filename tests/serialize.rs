#![cfg(feature = "serde")]

use blendcurve::prelude::NurbsCurve3D;
use nalgebra::Point3;

#[test]
fn test_serialization() {
    let curve = NurbsCurve3D::polyline(&[
        Point3::new(0., 0., 0.),
        Point3::new(1., 0., 0.),
        Point3::new(1., 1., 0.),
    ]);
    let json = serde_json::to_string_pretty(&curve).unwrap();
    let deserialized: NurbsCurve3D<f64> = serde_json::from_str(&json).unwrap();
    assert_eq!(curve.knots(), deserialized.knots());
    assert_eq!(curve.control_points(), deserialized.control_points());
    assert_eq!(curve.degree(), deserialized.degree());
}
