use argmin::core::{ArgminFloat, Executor, State};
use gauss_quad::GaussLegendre;
use itertools::Itertools;
use nalgebra::allocator::Allocator;
use nalgebra::{
    Const, DefaultAllocator, DimName, DimNameDiff, DimNameSub, OPoint, OVector, RealField, U1,
};
use simba::scalar::SupersetOf;

use crate::closest_parameter::{ClosestParameterNewton, ClosestParameterProblem};
use crate::knot::KnotVector;
use crate::misc::{binomial, segment_closest_point, FloatingPoint, Invertible};

/// NURBS curve representation
/// By generics, it can be used for 2D or 3D curves with f32 or f64 scalar types
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound(
        serialize = "T: serde::Serialize, OPoint<T, D>: serde::Serialize",
        deserialize = "T: serde::Deserialize<'de>, OPoint<T, D>: serde::Deserialize<'de>"
    ))
)]
pub struct NurbsCurve<T: FloatingPoint, D: DimName>
where
    DefaultAllocator: Allocator<D>,
{
    /// control points with homogeneous coordinates
    /// the last element of the vector is the `weight`
    control_points: Vec<OPoint<T, D>>,
    degree: usize,
    /// knot vector for the NURBS curve
    /// the length of the knot vector is equal to the `# of control points + degree + 1`
    knots: KnotVector<T>,
}

/// 2D NURBS curve alias
pub type NurbsCurve2D<T> = NurbsCurve<T, Const<3>>;

/// 3D NURBS curve alias
pub type NurbsCurve3D<T> = NurbsCurve<T, Const<4>>;

impl<T: FloatingPoint, D: DimName> NurbsCurve<T, D>
where
    DefaultAllocator: Allocator<D>,
{
    /// Create a new NURBS curve
    /// # Failures
    /// - if the number of control points is less than the degree
    /// - the number of knots is not equal to the number of control points + the degree + 1
    ///
    /// # Example
    /// ```
    /// use blendcurve::prelude::*;
    /// use nalgebra::Point3;
    ///
    /// let w = 1.; // weight for each control point
    /// let control_points: Vec<Point3<f64>> = vec![
    ///     Point3::new(50., 50., w),
    ///     Point3::new(30., 370., w),
    ///     Point3::new(180., 350., w),
    ///     Point3::new(150., 100., w),
    ///     Point3::new(250., 50., w),
    ///     Point3::new(350., 100., w),
    ///     Point3::new(470., 400., w),
    /// ];
    /// let degree = 3;
    /// let m = control_points.len() + degree + 1;
    /// // create an uniform knot vector
    /// let knots = (0..m).map(|i| i as f64).collect();
    /// let nurbs = NurbsCurve::try_new(3, control_points, knots);
    /// assert!(nurbs.is_ok());
    /// ```
    pub fn try_new(
        degree: usize,
        control_points: Vec<OPoint<T, D>>,
        knots: Vec<T>,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            control_points.len() > degree,
            "Too few control points for curve"
        );
        anyhow::ensure!(
            knots.len() == control_points.len() + degree + 1,
            "Invalid number of knots, got {}, expected {}",
            knots.len(),
            control_points.len() + degree + 1
        );

        let mut knots = knots.clone();
        knots.sort_by(|a, b| a.partial_cmp(b).unwrap());

        Ok(Self {
            degree,
            control_points,
            knots: KnotVector::new(knots),
        })
    }

    /// Build a curve from dehomogenized poles, weights and the distinct
    /// knots paired with their multiplicities.
    /// A non-periodic curve must be clamped (end multiplicities of `degree + 1`);
    /// a periodic one is expected to carry its wrap-around poles explicitly and
    /// may use any end multiplicities.
    /// # Failures
    /// Fails with an invalid NURBS definition if the pole, weight, knot and
    /// multiplicity counts are inconsistent with the degree.
    pub fn try_from_poles_mults_knots(
        degree: usize,
        poles: &[OPoint<T, DimNameDiff<D, U1>>],
        weights: &[T],
        knots: &[T],
        multiplicities: &[usize],
        periodic: bool,
    ) -> anyhow::Result<Self>
    where
        D: DimNameSub<U1>,
        DefaultAllocator: Allocator<DimNameDiff<D, U1>>,
    {
        anyhow::ensure!(
            poles.len() == weights.len(),
            "Invalid NURBS definition: {} poles but {} weights",
            poles.len(),
            weights.len()
        );
        anyhow::ensure!(
            weights.iter().all(|w| *w > T::zero()),
            "Invalid NURBS definition: weights must be positive"
        );
        anyhow::ensure!(
            knots.len() == multiplicities.len() && knots.len() >= 2,
            "Invalid NURBS definition: {} distinct knots but {} multiplicities",
            knots.len(),
            multiplicities.len()
        );
        anyhow::ensure!(
            knots.windows(2).all(|w| w[0] < w[1]),
            "Invalid NURBS definition: knots must be strictly increasing"
        );
        anyhow::ensure!(
            degree < poles.len(),
            "Invalid NURBS definition: degree {} must be less than the number of poles {}",
            degree,
            poles.len()
        );

        let total: usize = multiplicities.iter().sum();
        anyhow::ensure!(
            total == poles.len() + degree + 1,
            "Invalid NURBS definition: multiplicities sum to {}, expected {}",
            total,
            poles.len() + degree + 1
        );
        anyhow::ensure!(
            multiplicities[1..multiplicities.len() - 1]
                .iter()
                .all(|m| (1..=degree).contains(m)),
            "Invalid NURBS definition: interior multiplicities must be between 1 and the degree"
        );
        if !periodic {
            anyhow::ensure!(
                multiplicities[0] == degree + 1
                    && multiplicities[multiplicities.len() - 1] == degree + 1,
                "Invalid NURBS definition: a non-periodic curve requires end multiplicities of degree + 1"
            );
        }

        let expanded = knots
            .iter()
            .zip(multiplicities.iter())
            .flat_map(|(k, m)| std::iter::repeat_n(*k, *m))
            .collect_vec();

        Ok(Self {
            degree,
            control_points: poles
                .iter()
                .zip(weights.iter())
                .map(|(p, w)| homogenize(p, *w))
                .collect(),
            knots: KnotVector::new(expanded),
        })
    }

    /// Create a degree 1 polyline curve with chord length parameterization
    /// # Example
    /// ```
    /// use blendcurve::prelude::*;
    /// use nalgebra::Point3;
    /// use approx::assert_relative_eq;
    /// let line = NurbsCurve3D::polyline(&[
    ///     Point3::new(0., 0., 0.),
    ///     Point3::new(2., 0., 0.),
    /// ]);
    /// assert_eq!(line.knots_domain(), (0., 2.));
    /// assert_relative_eq!(line.point_at(0.5), Point3::new(0.5, 0., 0.));
    /// ```
    pub fn polyline(points: &[OPoint<T, DimNameDiff<D, U1>>]) -> Self
    where
        D: DimNameSub<U1>,
        DefaultAllocator: Allocator<DimNameDiff<D, U1>>,
    {
        let mut knots = vec![T::zero(), T::zero()];
        let mut acc = T::zero();
        for w in points.windows(2) {
            acc += (&w[1] - &w[0]).norm();
            knots.push(acc);
        }
        knots.push(acc);

        Self {
            degree: 1,
            control_points: points.iter().map(|p| homogenize(p, T::one())).collect(),
            knots: KnotVector::new(knots),
        }
    }

    /// Return the dehomogenized control points, the poles of the curve
    pub fn dehomogenized_control_points(&self) -> Vec<OPoint<T, DimNameDiff<D, U1>>>
    where
        D: DimNameSub<U1>,
        DefaultAllocator: Allocator<DimNameDiff<D, U1>>,
    {
        self.control_points
            .iter()
            .map(|p| dehomogenize(p).unwrap())
            .collect_vec()
    }

    /// Replace the poles of the curve, keeping its weights, knots and degree
    /// # Failures
    /// - if the number of poles does not match the current control point count
    pub fn try_set_poles(&mut self, poles: &[OPoint<T, DimNameDiff<D, U1>>]) -> anyhow::Result<()>
    where
        D: DimNameSub<U1>,
        DefaultAllocator: Allocator<DimNameDiff<D, U1>>,
    {
        anyhow::ensure!(
            poles.len() == self.control_points.len(),
            "Expected {} poles, got {}",
            self.control_points.len(),
            poles.len()
        );
        let weights = self.weights();
        self.control_points = poles
            .iter()
            .zip(weights.iter())
            .map(|(p, w)| homogenize(p, *w))
            .collect();
        Ok(())
    }

    pub fn weights(&self) -> Vec<T> {
        self.control_points
            .iter()
            .map(|p| p[D::dim() - 1])
            .collect()
    }

    /// A curve is rational iff its weights are not all equal
    pub fn is_rational(&self) -> bool {
        let weights = self.weights();
        weights
            .iter()
            .any(|w| (*w - weights[0]).abs() > T::default_epsilon())
    }

    /// Evaluate the curve at a given parameter to get a dehomonogenized point
    pub fn point_at(&self, t: T) -> OPoint<T, DimNameDiff<D, U1>>
    where
        D: DimNameSub<U1>,
        DefaultAllocator: Allocator<DimNameDiff<D, U1>>,
    {
        let p = self.point(t);
        dehomogenize(&p).unwrap()
    }

    /// Sample the curve at a given number of points between the start and end parameters
    pub fn sample_regular_range(
        &self,
        start: T,
        end: T,
        samples: usize,
    ) -> Vec<OPoint<T, DimNameDiff<D, U1>>>
    where
        D: DimNameSub<U1>,
        DefaultAllocator: Allocator<DimNameDiff<D, U1>>,
    {
        let mut points = vec![];
        let us = T::from_usize(samples).unwrap();
        let step = (end - start) / (us - T::one());
        for i in 0..samples {
            let t = start + T::from_usize(i).unwrap() * step;
            points.push(self.point_at(t));
        }
        points
    }

    #[allow(clippy::type_complexity)]
    /// Sample the curve at a given number of points between the start and end
    /// Return the vector of tuples of parameter and point
    pub fn sample_regular_range_with_parameter(
        &self,
        start: T,
        end: T,
        samples: usize,
    ) -> Vec<(T, OPoint<T, DimNameDiff<D, U1>>)>
    where
        D: DimNameSub<U1>,
        DefaultAllocator: Allocator<DimNameDiff<D, U1>>,
    {
        let mut points = vec![];
        let us = T::from_usize(samples).unwrap();
        let step = (end - start) / (us - T::one());
        for i in 0..samples {
            let t = start + T::from_usize(i).unwrap() * step;
            points.push((t, self.point_at(t)));
        }
        points
    }

    /// Evaluate the curve at a given parameter to get a point
    pub(crate) fn point(&self, t: T) -> OPoint<T, D> {
        let n = self.knots.len() - self.degree - 2;
        let knot_span_index = self.knots.find_knot_span_index(n, self.degree, t);
        let basis = self.knots.basis_functions(knot_span_index, t, self.degree);
        let mut position = OPoint::<T, D>::origin();
        for i in 0..=self.degree {
            position.coords +=
                &self.control_points[knot_span_index - self.degree + i].coords * basis[i];
        }
        position
    }

    /// Evaluate the curve at a given parameter to get a tangent vector
    /// # Example
    /// ```
    /// use blendcurve::prelude::*;
    /// use nalgebra::{Point3, Vector3};
    /// use approx::assert_relative_eq;
    /// let line = NurbsCurve3D::polyline(&[
    ///     Point3::new(0., 0., 0.),
    ///     Point3::new(2., 0., 0.),
    /// ]);
    /// // chord length parameterization yields a unit speed tangent
    /// assert_relative_eq!(line.tangent_at(1.), Vector3::new(1., 0., 0.));
    /// ```
    pub fn tangent_at(&self, u: T) -> OVector<T, DimNameDiff<D, U1>>
    where
        D: DimNameSub<U1>,
        DefaultAllocator: Allocator<DimNameDiff<D, U1>>,
    {
        let deriv = self.rational_derivatives(u, 1);
        deriv[1].clone()
    }

    /// Evaluate the curvature at a given parameter
    /// Returns zero where the curve is locally flat
    /// # Example
    /// ```
    /// use blendcurve::prelude::*;
    /// use nalgebra::Point2;
    /// use approx::assert_relative_eq;
    /// let w = std::f64::consts::FRAC_1_SQRT_2;
    /// let poles = [
    ///     Point2::new(1., 0.), Point2::new(1., 1.), Point2::new(0., 1.),
    ///     Point2::new(-1., 1.), Point2::new(-1., 0.), Point2::new(-1., -1.),
    ///     Point2::new(0., -1.), Point2::new(1., -1.), Point2::new(1., 0.),
    /// ];
    /// let weights = [1., w, 1., w, 1., w, 1., w, 1.];
    /// let unit_circle = NurbsCurve2D::try_from_poles_mults_knots(
    ///     2, &poles, &weights,
    ///     &[0., 0.25, 0.5, 0.75, 1.], &[3, 2, 2, 2, 3], false,
    /// ).unwrap();
    /// assert_relative_eq!(unit_circle.curvature_at(0.1), 1., epsilon = 1e-10);
    /// ```
    pub fn curvature_at(&self, u: T) -> T
    where
        D: DimNameSub<U1>,
        DefaultAllocator: Allocator<DimNameDiff<D, U1>>,
    {
        let derivs = self.rational_derivatives(u, 2);
        let d1 = &derivs[1];
        let d2 = &derivs[2];
        let speed2 = d1.norm_squared();
        if speed2 <= T::default_epsilon() {
            return T::zero();
        }
        // dimension agnostic form of |C' x C''| / |C'|^3
        let numerator = (speed2 * d2.norm_squared() - d1.dot(d2).powi(2))
            .max(T::zero())
            .sqrt();
        numerator / (speed2 * speed2.sqrt())
    }

    /// Evaluate the rational derivatives at a given parameter
    pub(crate) fn rational_derivatives(
        &self,
        u: T,
        derivs: usize,
    ) -> Vec<OVector<T, DimNameDiff<D, U1>>>
    where
        D: DimNameSub<U1>,
        DefaultAllocator: Allocator<DimNameDiff<D, U1>>,
    {
        let ders = self.derivatives(u, derivs);
        let a_ders: Vec<_> = ders
            .iter()
            .map(|d| {
                let mut a_ders = vec![];
                for i in 0..D::dim() - 1 {
                    a_ders.push(d[i]);
                }
                OVector::<T, DimNameDiff<D, U1>>::from_vec(a_ders)
            })
            .collect();
        let w_ders: Vec<_> = ders.iter().map(|d| d[D::dim() - 1]).collect();

        let mut ck = vec![];
        for k in 0..=derivs {
            let mut v = a_ders[k].clone();

            for i in 1..=k {
                let coef = binomial::<T>(k, i) * w_ders[i];
                v -= &ck[k - i] * coef;
            }

            let dehom = v / w_ders[0];
            ck.push(dehom);
        }
        ck
    }

    /// Evaluate the derivatives at a given parameter
    fn derivatives(&self, u: T, derivs: usize) -> Vec<OVector<T, D>> {
        let n = self.knots.len() - self.degree - 2;

        let du = if derivs < self.degree {
            derivs
        } else {
            self.degree
        };
        let mut derivatives = vec![OVector::<T, D>::zeros(); derivs + 1];

        let knot_span_index = self.knots.find_knot_span_index(n, self.degree, u);
        let nders = self
            .knots
            .derivative_basis_functions(knot_span_index, u, self.degree, du);
        for k in 0..=du {
            for j in 0..=self.degree {
                let w = &self.control_points[knot_span_index - self.degree + j] * nders[k][j];
                let column = derivatives.get_mut(k).unwrap();
                w.coords.iter().enumerate().for_each(|(i, v)| {
                    column[i] += *v;
                });
            }
        }

        derivatives
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn knots(&self) -> &KnotVector<T> {
        &self.knots
    }

    pub fn control_points(&self) -> &Vec<OPoint<T, D>> {
        &self.control_points
    }

    /// The parametric domain of the curve,
    /// its first and last parameters
    pub fn knots_domain(&self) -> (T, T) {
        self.knots.domain(self.degree)
    }

    /// Create a copy of the curve with its knot vector scaled to `[0, length]`
    /// # Failures
    /// - if the knot vector has zero span
    pub fn try_scaled_knots(&self, length: T) -> anyhow::Result<Self> {
        Ok(Self {
            control_points: self.control_points.clone(),
            degree: self.degree,
            knots: self.knots.try_scaled(length)?,
        })
    }

    /// Check if the curve is clamped
    pub fn is_clamped(&self) -> bool {
        self.knots.is_clamped(self.degree)
    }

    /// Check if the first and last control points coincide
    pub fn is_closed(&self) -> bool {
        let first = &self.control_points[0];
        let last = &self.control_points[self.control_points.len() - 1];
        (first - last).norm() < T::default_epsilon()
    }

    /// Compute the length of the curve by gauss-legendre quadrature
    /// over each distinct knot span
    /// # Failures
    /// - if the knot vector is degenerate
    ///
    /// # Example
    /// ```
    /// use blendcurve::prelude::*;
    /// use nalgebra::Point3;
    /// use approx::assert_relative_eq;
    /// let line = NurbsCurve3D::polyline(&[
    ///     Point3::new(0., 0., 0.),
    ///     Point3::new(3., 4., 0.),
    /// ]);
    /// assert_relative_eq!(line.try_length().unwrap(), 5., epsilon = 1e-10);
    /// ```
    pub fn try_length(&self) -> anyhow::Result<T>
    where
        D: DimNameSub<U1>,
        DefaultAllocator: Allocator<DimNameDiff<D, U1>>,
    {
        let (start, end) = self.knots_domain();
        anyhow::ensure!(
            end - start > T::default_epsilon(),
            "Degenerate knot range: [{}, {}]",
            start,
            end
        );

        let gauss = GaussLegendre::new(16 + self.degree)?;
        let mut length = T::zero();
        for w in self.knots.multiplicity().windows(2) {
            let a = (*w[0].knot()).max(start);
            let b = (*w[1].knot()).min(end);
            if b - a <= T::default_epsilon() {
                continue;
            }
            let sum = gauss.integrate(a.to_f64().unwrap(), b.to_f64().unwrap(), |x| {
                let u = T::from_f64(x).unwrap();
                self.rational_derivatives(u, 1)[1].norm().to_f64().unwrap()
            });
            length += T::from_f64(sum).unwrap();
        }
        Ok(length)
    }

    /// Find the closest point on the curve to a given point
    pub fn find_closest_point(
        &self,
        point: &OPoint<T, DimNameDiff<D, U1>>,
    ) -> anyhow::Result<OPoint<T, DimNameDiff<D, U1>>>
    where
        D: DimNameSub<U1>,
        DefaultAllocator: Allocator<DimNameDiff<D, U1>>,
        T: ArgminFloat,
    {
        self.find_closest_parameter(point).map(|u| self.point_at(u))
    }

    /// Find the closest parameter on the curve to a given point with Newton's method
    /// This is the inverse of evaluating a point on the curve
    pub fn find_closest_parameter(&self, point: &OPoint<T, DimNameDiff<D, U1>>) -> anyhow::Result<T>
    where
        D: DimNameSub<U1>,
        DefaultAllocator: Allocator<DimNameDiff<D, U1>>,
        T: ArgminFloat,
    {
        let (min_u, max_u) = self.knots_domain();
        let samples = (self.control_points.len() * self.degree).max(2);
        let pts = self.sample_regular_range_with_parameter(min_u, max_u, samples);

        let mut min = <T as RealField>::max_value().unwrap();
        let mut u = min_u;

        let closed = self.is_closed();

        for i in 0..pts.len() - 1 {
            let u0 = pts[i].0;
            let u1 = pts[i + 1].0;

            let p0 = &pts[i].1;
            let p1 = &pts[i + 1].1;

            let (proj_u, proj_pt) = segment_closest_point(point, p0, p1, u0, u1);
            let d = (point - &proj_pt).norm();

            if d < min {
                min = d;
                u = proj_u;
            }
        }

        let solver = ClosestParameterNewton::new((min_u, max_u), closed);
        let res = Executor::new(ClosestParameterProblem::new(point, self), solver)
            .configure(|state| state.param(u).max_iters(5))
            .run()?;
        res.state()
            .get_best_param()
            .cloned()
            .ok_or(anyhow::anyhow!("No best parameter found"))
    }

    /// Cast the curve to a curve with another floating point type
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> NurbsCurve<F, D>
    where
        DefaultAllocator: Allocator<D>,
    {
        NurbsCurve {
            control_points: self
                .control_points
                .iter()
                .map(|p| p.clone().cast())
                .collect(),
            degree: self.degree,
            knots: self.knots.cast(),
        }
    }
}

impl<T: FloatingPoint, D: DimName> Invertible for NurbsCurve<T, D>
where
    DefaultAllocator: Allocator<D>,
{
    /// Reverse the direction of the curve
    /// # Example
    /// ```
    /// use blendcurve::prelude::*;
    /// use nalgebra::Point3;
    /// use approx::assert_relative_eq;
    /// let line = NurbsCurve3D::polyline(&[
    ///     Point3::new(0., 0., 0.),
    ///     Point3::new(1., 1., 0.),
    /// ]);
    /// let reversed = line.inverted();
    /// let (start, end) = reversed.knots_domain();
    /// assert_relative_eq!(reversed.point_at(start), Point3::new(1., 1., 0.));
    /// assert_relative_eq!(reversed.point_at(end), Point3::new(0., 0., 0.));
    /// ```
    fn invert(&mut self) {
        self.control_points.reverse();
        self.knots.invert();
    }
}

/// Dehomogenize a point
pub fn dehomogenize<T: FloatingPoint, D: DimName>(
    point: &OPoint<T, D>,
) -> Option<OPoint<T, DimNameDiff<D, U1>>>
where
    D: DimNameSub<U1>,
    DefaultAllocator: Allocator<D> + Allocator<DimNameDiff<D, U1>>,
{
    let w = point[D::dim() - 1];
    if w == T::zero() {
        return None;
    }
    let mut dehom = OPoint::<T, DimNameDiff<D, U1>>::origin();
    for i in 0..D::dim() - 1 {
        dehom[i] = point[i] / w;
    }
    Some(dehom)
}

/// Homogenize a point with a given weight
pub fn homogenize<T: FloatingPoint, D: DimName>(
    point: &OPoint<T, DimNameDiff<D, U1>>,
    weight: T,
) -> OPoint<T, D>
where
    D: DimNameSub<U1>,
    DefaultAllocator: Allocator<D> + Allocator<DimNameDiff<D, U1>>,
{
    let mut hom = OPoint::<T, D>::origin();
    for i in 0..D::dim() - 1 {
        hom[i] = point[i] * weight;
    }
    hom[D::dim() - 1] = weight;
    hom
}
