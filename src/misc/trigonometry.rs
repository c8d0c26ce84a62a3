use nalgebra::{allocator::Allocator, DefaultAllocator, DimName, OPoint, RealField};

/// Find the closest point on a segment
/// * `pt` - point to project
/// * `start` - start point of segment
/// * `end` - end point of segment
/// * `u0` - parameter at the start of the segment
/// * `u1` - parameter at the end of the segment
pub fn segment_closest_point<T: RealField + Copy, D: DimName>(
    pt: &OPoint<T, D>,
    start: &OPoint<T, D>,
    end: &OPoint<T, D>,
    u0: T,
    u1: T,
) -> (T, OPoint<T, D>)
where
    DefaultAllocator: Allocator<D>,
{
    let dir = end - start;
    let l2 = dir.norm_squared();
    if l2 <= T::default_epsilon() {
        return (u0, start.clone());
    }

    let t = ((pt - start).dot(&dir) / l2).clamp(T::zero(), T::one());
    (u0 + (u1 - u0) * t, start + dir * t)
}
