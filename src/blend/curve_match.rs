use argmin::core::ArgminFloat;
use log::{debug, warn};
use nalgebra::{
    allocator::Allocator, ComplexField, DefaultAllocator, DimName, DimNameDiff, DimNameSub, OPoint,
    OVector, U1,
};

use crate::curve::NurbsCurve;
use crate::misc::{FloatingPoint, Invertible};

/// Options for matching the start of a curve against a reference curve
#[derive(Debug, Clone, Copy)]
pub struct CurveMatchOption<T: FloatingPoint> {
    /// parameter on the reference curve where the derivatives are taken
    reference_parameter: T,
    /// number of derivative orders to match, 0 matches position only
    continuity: usize,
    /// reparameterization factor of the reference curve,
    /// a negative sign reverses the blend direction
    scale: T,
}

impl<T: FloatingPoint> CurveMatchOption<T> {
    pub fn new(reference_parameter: T) -> Self {
        Self {
            reference_parameter,
            continuity: 0,
            scale: T::one(),
        }
    }

    pub fn with_continuity(mut self, continuity: usize) -> Self {
        self.continuity = continuity;
        self
    }

    pub fn with_scale(mut self, scale: T) -> Self {
        self.scale = scale;
        self
    }

    pub fn reference_parameter(&self) -> T {
        self.reference_parameter
    }

    pub fn continuity(&self) -> usize {
        self.continuity
    }

    pub fn scale(&self) -> T {
        self.scale
    }
}

/// Outcome of a curve match: the modified curve and the number of
/// derivative orders that could actually be matched.
#[derive(Debug, Clone)]
pub struct CurveMatch<T: FloatingPoint, D: DimName>
where
    DefaultAllocator: Allocator<D>,
{
    curve: NurbsCurve<T, D>,
    requested: usize,
    achieved: usize,
}

impl<T: FloatingPoint, D: DimName> CurveMatch<T, D>
where
    DefaultAllocator: Allocator<D>,
{
    pub fn curve(&self) -> &NurbsCurve<T, D> {
        &self.curve
    }

    pub fn into_curve(self) -> NurbsCurve<T, D> {
        self.curve
    }

    /// The highest derivative order that was matched
    pub fn achieved(&self) -> usize {
        self.achieved
    }

    /// The derivative order that was requested
    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn is_complete(&self) -> bool {
        self.achieved == self.requested
    }
}

impl<T: FloatingPoint, D: DimName> NurbsCurve<T, D>
where
    DefaultAllocator: Allocator<D>,
{
    /// Solve the leading poles of this curve so that its value and successive
    /// derivatives at the start equal those of `reference` at the given
    /// parameter, scaled by the option's factor.
    ///
    /// Both curves are reparameterized to arc length proportional knot
    /// vectors so that the derivative magnitudes are comparable regardless
    /// of the original parameterization speed. A negative scale reverses the
    /// reference before matching.
    ///
    /// Poles are solved order by order: the order `l` equation only involves
    /// the already fixed poles `0..l` and the unknown pole `l`, whose basis
    /// derivative is the single new nonzero coefficient at the boundary of a
    /// clamped curve. When that coefficient vanishes the match is truncated
    /// and the result reports the order actually reached.
    ///
    /// # Failures
    /// - if either curve has a degenerate knot range or zero length
    /// - if the scale is zero
    /// - if this curve is not clamped
    pub fn try_match_end(
        &self,
        reference: &Self,
        option: CurveMatchOption<T>,
    ) -> anyhow::Result<CurveMatch<T, D>>
    where
        D: DimNameSub<U1>,
        DefaultAllocator: Allocator<DimNameDiff<D, U1>>,
        T: ArgminFloat,
    {
        let level = option.continuity();
        let scale = option.scale();
        anyhow::ensure!(scale != T::zero(), "Cannot match with a zero scale");
        anyhow::ensure!(self.is_clamped(), "The matched curve must be clamped");
        anyhow::ensure!(
            level < self.control_points().len(),
            "Matching {} derivative orders requires at least {} poles, got {}",
            level,
            level + 1,
            self.control_points().len()
        );

        let len1 = reference.try_length()?;
        anyhow::ensure!(len1 > T::default_epsilon(), "Degenerate reference curve");
        let mut len2 = self.try_length()?;
        if len2 <= T::default_epsilon() {
            warn!("Matched curve has zero length, assuming 1 for reparameterization");
            len2 = T::one();
        }

        let mut poles = self.dehomogenized_control_points();
        let seq2 = self.knots().try_scaled(ComplexField::abs(scale) * len2)?;
        let degree2 = self.degree();
        // the image of the first parameter under the rescale
        let target_start = seq2.domain(degree2).0;

        let mut bs1 = reference.try_scaled_knots(len1)?;
        if scale < T::zero() {
            bs1.invert();
        }

        // map the boundary point onto the rescaled, possibly reversed reference
        let boundary = reference.point_at(option.reference_parameter());
        let par1 = bs1.find_closest_parameter(&boundary)?;
        let p1 = bs1.dehomogenized_control_points();

        let degree1 = bs1.degree();
        let knots1 = bs1.knots();
        let n1 = knots1.len() - degree1 - 2;
        let span1 = knots1.find_knot_span_index(n1, degree1, par1);
        let first1 = span1 - degree1;
        let ders1 = knots1.derivative_basis_functions(span1, par1, degree1, level.min(degree1));

        let n2 = seq2.len() - degree2 - 2;
        let span2 = seq2.find_knot_span_index(n2, degree2, target_start);
        let ders2 = seq2.derivative_basis_functions(span2, target_start, degree2, level.min(degree2));

        let mut achieved = 0;
        for l in 0..=level {
            // the order l derivative of a clamped curve at its start weights
            // pole l with the first coefficient not fixed by lower orders;
            // beyond the degree every basis derivative vanishes
            if l > degree2 || ComplexField::abs(ders2[l][l]) <= T::default_epsilon() {
                warn!(
                    "Vanishing basis derivative at order {} (parameter {}, scale {}), match truncated",
                    l,
                    option.reference_parameter(),
                    scale
                );
                break;
            }

            // the requested derivative as a weighted sum of the reference poles
            let mut derived = OVector::<T, DimNameDiff<D, U1>>::zeros();
            if l <= degree1 {
                for (j, basis) in ders1[l].iter().enumerate() {
                    derived += &p1[first1 + j].coords * *basis;
                }
            }

            // contribution of the poles fixed by the lower orders
            let mut fixed = OVector::<T, DimNameDiff<D, U1>>::zeros();
            for i in 0..l {
                fixed += &poles[i].coords * ders2[l][i];
            }

            let pole = OPoint::from((derived - fixed) / ders2[l][l]);
            debug!("Moving pole {} from {} to {}", l, poles[l], pole);
            poles[l] = pole;
            achieved = l;
        }

        let mut curve = self.clone();
        curve.try_set_poles(&poles)?;

        Ok(CurveMatch {
            curve,
            requested: level,
            achieved,
        })
    }
}
