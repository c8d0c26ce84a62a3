use itertools::Itertools;
use nalgebra::{allocator::Allocator, DefaultAllocator, DimName, OPoint, OVector};

use crate::misc::FloatingPoint;

/// Straight segment between two points,
/// used as the chord of a blend curve
#[derive(Debug, Clone)]
pub struct Segment<T: FloatingPoint, D: DimName>
where
    DefaultAllocator: Allocator<D>,
{
    start: OPoint<T, D>,
    end: OPoint<T, D>,
    tangent: OVector<T, D>,
    length: T,
}

impl<T: FloatingPoint, D: DimName> Segment<T, D>
where
    DefaultAllocator: Allocator<D>,
{
    pub fn new(start: OPoint<T, D>, end: OPoint<T, D>) -> Self {
        let dir = &end - &start;
        let length = dir.norm();
        let tangent = if length > T::default_epsilon() {
            dir / length
        } else {
            // degenerate segment, no meaningful direction
            OVector::zeros()
        };
        Self {
            start,
            end,
            tangent,
            length,
        }
    }

    pub fn start(&self) -> &OPoint<T, D> {
        &self.start
    }

    pub fn end(&self) -> &OPoint<T, D> {
        &self.end
    }

    pub fn tangent(&self) -> &OVector<T, D> {
        &self.tangent
    }

    pub fn length(&self) -> T {
        self.length
    }

    /// Evaluate the segment at a normalized parameter in `[0, 1]`
    pub fn point_at(&self, t: T) -> OPoint<T, D> {
        self.start.lerp(&self.end, t)
    }

    /// Discretize the segment into `n` evenly spaced points,
    /// including both end points
    /// # Example
    /// ```
    /// use blendcurve::prelude::*;
    /// use nalgebra::Point3;
    /// use approx::assert_relative_eq;
    /// let segment = Segment::new(Point3::new(0., 0., 0.), Point3::new(3., 0., 0.));
    /// let samples = segment.sample(4);
    /// assert_relative_eq!(samples[1], Point3::new(1., 0., 0.), epsilon = 1e-12);
    /// assert_relative_eq!(samples[3], Point3::new(3., 0., 0.), epsilon = 1e-12);
    /// ```
    pub fn sample(&self, n: usize) -> Vec<OPoint<T, D>> {
        if n <= 1 {
            return vec![self.start.clone()];
        }
        let last = T::from_usize(n - 1).unwrap();
        (0..n)
            .map(|i| self.point_at(T::from_usize(i).unwrap() / last))
            .collect_vec()
    }
}
