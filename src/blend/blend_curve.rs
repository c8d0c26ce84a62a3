use argmin::core::ArgminFloat;
use log::warn;
use nalgebra::{
    allocator::Allocator, DefaultAllocator, DimName, DimNameDiff, DimNameSub, OPoint, U1,
};

use crate::curve::{homogenize, NurbsCurve};
use crate::knot::KnotVector;
use crate::misc::{FloatingPoint, Invertible, Segment};

use super::CurveMatchOption;

/// Which end of the blend a diagnostic refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendEnd {
    Start,
    End,
}

/// Degraded result conditions collected while computing a blend.
/// These do not abort the computation, the resulting curve is a
/// best effort one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlendWarning<T: FloatingPoint> {
    /// The two attachment points coincide, the chord length was clamped to 1
    ZeroChordLength { length: T },
    /// The requested continuity implies a degree beyond the representation limit
    DegreeClamped { requested: usize, clamped: usize },
    /// A vanishing basis derivative truncated the match at one end
    ContinuityTruncated {
        end: BlendEnd,
        requested: usize,
        achieved: usize,
    },
}

/// Degree limit of the underlying curve representation
pub const DEFAULT_MAX_DEGREE: usize = 25;

const CHORD_LENGTH_TOLERANCE: f64 = 1e-6;

/// A blend curve joining two edge curves at chosen parameters while
/// matching a requested number of derivatives at each end, with an
/// independently controllable scale per side.
///
/// The edges are borrowed, the blend owns the computed curve. The curve is
/// recomputed on demand whenever an input changed since the last computation.
#[derive(Debug)]
pub struct BlendCurve<'a, T: FloatingPoint, D: DimName>
where
    DefaultAllocator: Allocator<D>,
{
    edge1: &'a NurbsCurve<T, D>,
    edge2: &'a NurbsCurve<T, D>,
    param1: T,
    param2: T,
    cont1: usize,
    cont2: usize,
    scale1: T,
    scale2: T,
    max_degree: usize,
    strict: bool,
    chord_length: T,
    curve: Option<NurbsCurve<T, D>>,
    warnings: Vec<BlendWarning<T>>,
}

impl<'a, T: FloatingPoint, D: DimName> BlendCurve<'a, T, D>
where
    D: DimNameSub<U1>,
    DefaultAllocator: Allocator<D> + Allocator<DimNameDiff<D, U1>>,
{
    /// Bind a blend to two edge curves, attached at their first parameters,
    /// with positional continuity and unit scale on both ends.
    pub fn new(edge1: &'a NurbsCurve<T, D>, edge2: &'a NurbsCurve<T, D>) -> Self {
        let param1 = edge1.knots_domain().0;
        let param2 = edge2.knots_domain().0;
        let mut blend = Self {
            edge1,
            edge2,
            param1,
            param2,
            cont1: 0,
            cont2: 0,
            scale1: T::one(),
            scale2: T::one(),
            max_degree: DEFAULT_MAX_DEGREE,
            strict: false,
            chord_length: T::zero(),
            curve: None,
            warnings: vec![],
        };
        blend.update_chord_length();
        blend
    }

    /// The straight segment between the two evaluated attachment points
    pub fn chord(&self) -> Segment<T, DimNameDiff<D, U1>> {
        Segment::new(
            self.edge1.point_at(self.param1),
            self.edge2.point_at(self.param2),
        )
    }

    /// The chord length, clamped to 1 when the attachment points coincide
    pub fn chord_length(&self) -> T {
        self.chord_length
    }

    pub fn param1(&self) -> T {
        self.param1
    }

    pub fn param2(&self) -> T {
        self.param2
    }

    pub fn cont1(&self) -> usize {
        self.cont1
    }

    pub fn cont2(&self) -> usize {
        self.cont2
    }

    pub fn scale1(&self) -> T {
        self.scale1
    }

    pub fn scale2(&self) -> T {
        self.scale2
    }

    pub fn max_degree(&self) -> usize {
        self.max_degree
    }

    /// Set the attachment parameter on the first edge
    pub fn set_param1(&mut self, param: T) {
        self.param1 = param;
        self.invalidate();
        self.update_chord_length();
    }

    /// Set the attachment parameter on the second edge
    pub fn set_param2(&mut self, param: T) {
        self.param2 = param;
        self.invalidate();
        self.update_chord_length();
    }

    /// Set the continuity order at the first edge, 0 matches position only
    pub fn set_cont1(&mut self, continuity: usize) {
        self.cont1 = continuity;
        self.invalidate();
    }

    /// Set the continuity order at the second edge
    pub fn set_cont2(&mut self, continuity: usize) {
        self.cont2 = continuity;
        self.invalidate();
    }

    /// Set the blend scale at the first edge,
    /// a negative sign reverses the blend direction
    pub fn set_scale1(&mut self, scale: T) {
        self.scale1 = scale;
        self.invalidate();
    }

    /// Set the blend scale at the second edge
    pub fn set_scale2(&mut self, scale: T) {
        self.scale2 = scale;
        self.invalidate();
    }

    /// Limit the degree of the computed curve
    pub fn set_max_degree(&mut self, max_degree: usize) {
        self.max_degree = max_degree;
        self.invalidate();
    }

    /// In strict mode a clamped degree aborts the computation
    /// instead of degrading the achievable continuity
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.curve = None;
    }

    fn update_chord_length(&mut self) -> bool {
        let length = self.chord().length();
        let degenerate = length < T::from_f64(CHORD_LENGTH_TOLERANCE).unwrap();
        self.chord_length = if degenerate {
            warn!("Chord length {} below tolerance, clamping to 1", length);
            T::one()
        } else {
            length
        };
        degenerate
    }

    /// Compute the blend curve. Recomputation is skipped while the
    /// inputs are unchanged since the last call.
    ///
    /// The initial curve interpolates the chord with `cont1 + cont2 + 2`
    /// poles, then the poles of each end are solved against the matching
    /// edge, with an intermediate reversal to present the second end as
    /// the start. The result is oriented from the first edge to the second.
    pub fn compute(&mut self) -> anyhow::Result<()>
    where
        T: ArgminFloat,
    {
        if self.curve.is_some() {
            return Ok(());
        }

        let mut warnings = vec![];

        let chord = self.chord();
        if self.update_chord_length() {
            warnings.push(BlendWarning::ZeroChordLength {
                length: chord.length(),
            });
        }

        let nb_poles = self.cont1 + self.cont2 + 2;
        let poles = chord.sample(nb_poles);

        let requested_degree = nb_poles - 1;
        let degree = requested_degree.min(self.max_degree);
        if degree < requested_degree {
            if self.strict {
                anyhow::bail!(
                    "Continuity ({}, {}) requires degree {}, exceeding the limit {}",
                    self.cont1,
                    self.cont2,
                    requested_degree,
                    self.max_degree
                );
            }
            warn!(
                "Degree clamped from {} to {}, the requested continuity may not be reached",
                requested_degree, degree
            );
            warnings.push(BlendWarning::DegreeClamped {
                requested: requested_degree,
                clamped: degree,
            });
        }

        let knots = KnotVector::try_clamped_uniform(degree, nb_poles)?;
        let initial = NurbsCurve::try_new(
            degree,
            poles.iter().map(|p| homogenize(p, T::one())).collect(),
            knots.to_vec(),
        )?;

        let matched1 = initial.try_match_end(
            self.edge1,
            CurveMatchOption::new(self.param1)
                .with_continuity(self.cont1)
                .with_scale(self.scale1),
        )?;
        if matched1.achieved() < self.cont1 {
            warnings.push(BlendWarning::ContinuityTruncated {
                end: BlendEnd::Start,
                requested: self.cont1,
                achieved: matched1.achieved(),
            });
        }

        // flip the curve so its far end becomes the start of the second match
        let reversed = matched1.into_curve().inverted();

        let matched2 = reversed.try_match_end(
            self.edge2,
            CurveMatchOption::new(self.param2)
                .with_continuity(self.cont2)
                .with_scale(self.scale2),
        )?;
        if matched2.achieved() < self.cont2 {
            warnings.push(BlendWarning::ContinuityTruncated {
                end: BlendEnd::End,
                requested: self.cont2,
                achieved: matched2.achieved(),
            });
        }

        // orient the result from the first edge to the second
        let mut curve = matched2.into_curve();
        curve.invert();

        self.warnings = warnings;
        self.curve = Some(curve);
        Ok(())
    }

    /// The control points of the computed blend curve
    pub fn poles(&mut self) -> anyhow::Result<Vec<OPoint<T, DimNameDiff<D, U1>>>>
    where
        T: ArgminFloat,
    {
        self.compute()?;
        Ok(self.computed()?.dehomogenized_control_points())
    }

    /// The computed blend curve
    pub fn curve(&mut self) -> anyhow::Result<&NurbsCurve<T, D>>
    where
        T: ArgminFloat,
    {
        self.compute()?;
        self.computed()
    }

    /// A renderable polyline sampling of the computed blend curve
    pub fn shape(&mut self, samples: usize) -> anyhow::Result<Vec<OPoint<T, DimNameDiff<D, U1>>>>
    where
        T: ArgminFloat,
    {
        self.compute()?;
        let curve = self.computed()?;
        let (start, end) = curve.knots_domain();
        Ok(curve.sample_regular_range(start, end, samples))
    }

    /// Diagnostics collected by the last computation
    pub fn warnings(&self) -> &[BlendWarning<T>] {
        &self.warnings
    }

    fn computed(&self) -> anyhow::Result<&NurbsCurve<T, D>> {
        self.curve
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("The blend curve has not been computed"))
    }
}
