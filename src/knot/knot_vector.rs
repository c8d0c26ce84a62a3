use std::ops::Index;

use nalgebra::{convert, RealField};
use simba::scalar::SupersetOf;

use crate::misc::{FloatingPoint, Invertible};

use super::KnotMultiplicity;

/// Knot vector representation
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KnotVector<T>(Vec<T>);

impl<T: RealField + Copy> KnotVector<T> {
    pub fn new(knots: Vec<T>) -> Self {
        Self(knots)
    }

    /// Create the clamped uniform knot vector for a curve with
    /// `nb_poles` control points of the given degree.
    /// The end knots `0` and `nb_int_knots + 1` carry multiplicity `degree + 1`,
    /// interior knots sit at integer positions with multiplicity 1.
    /// # Failures
    /// - if `degree >= nb_poles`
    ///
    /// # Example
    /// ```
    /// use blendcurve::prelude::KnotVector;
    /// let knots: KnotVector<f64> = KnotVector::try_clamped_uniform(3, 5).unwrap();
    /// assert_eq!(knots.to_vec(), vec![0., 0., 0., 0., 1., 2., 2., 2., 2.]);
    /// ```
    pub fn try_clamped_uniform(degree: usize, nb_poles: usize) -> anyhow::Result<Self> {
        anyhow::ensure!(
            degree < nb_poles,
            "Invalid NURBS definition: degree {} must be less than the number of poles {}",
            degree,
            nb_poles
        );
        let nb_int_knots = nb_poles - degree - 1;
        let mut knots = vec![T::zero(); degree + 1];
        for k in 1..=nb_int_knots {
            knots.push(T::from_usize(k).unwrap());
        }
        knots.extend(std::iter::repeat_n(
            T::from_usize(nb_int_knots + 1).unwrap(),
            degree + 1,
        ));
        Ok(Self(knots))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.0.clone()
    }

    pub fn first(&self) -> T {
        self.0[0]
    }

    pub fn last(&self) -> T {
        self.0[self.0.len() - 1]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<T> {
        self.0.iter()
    }

    /// Get the domain of the knot vector by degree
    pub fn domain(&self, degree: usize) -> (T, T) {
        (self.0[degree], self.0[self.0.len() - 1 - degree])
    }

    /// Affine map of the knot vector onto `[0, length]`
    /// # Failures
    /// - if the knot vector has zero span
    ///
    /// # Example
    /// ```
    /// use blendcurve::prelude::KnotVector;
    /// let knots = KnotVector::new(vec![1., 1., 2., 3., 3.]);
    /// let scaled = knots.try_scaled(4.).unwrap();
    /// assert_eq!(scaled.to_vec(), vec![0., 0., 2., 4., 4.]);
    /// ```
    pub fn try_scaled(&self, length: T) -> anyhow::Result<Self> {
        let min = self.first();
        let max = self.last();
        let span = max - min;
        anyhow::ensure!(
            span > T::default_epsilon(),
            "Degenerate knot range: [{}, {}]",
            min,
            max
        );
        Ok(Self(
            self.0.iter().map(|k| length * (*k - min) / span).collect(),
        ))
    }

    /// Affine map of the knot vector onto `[0, 1]`
    pub fn try_normalized(&self) -> anyhow::Result<Self> {
        self.try_scaled(T::one())
    }

    /// Get the multiplicity of each knot
    /// # Example
    /// ```
    /// use blendcurve::prelude::KnotVector;
    /// let knots = KnotVector::new(vec![0., 0., 0., 1., 2., 3., 3., 3.]);
    /// let knot_multiplicity = knots.multiplicity();
    /// assert_eq!(knot_multiplicity[0].multiplicity(), 3);
    /// assert_eq!(knot_multiplicity[1].multiplicity(), 1);
    /// assert_eq!(knot_multiplicity[2].multiplicity(), 1);
    /// assert_eq!(knot_multiplicity[3].multiplicity(), 3);
    /// ```
    pub fn multiplicity(&self) -> Vec<KnotMultiplicity<T>> {
        let mut mult = vec![];

        let mut current = KnotMultiplicity::new(self.0[0], 0);
        self.0.iter().for_each(|knot| {
            if (*knot - *current.knot()).abs() > T::default_epsilon() {
                mult.push(current.clone());
                current = KnotMultiplicity::new(*knot, 0);
            }
            current.increment_multiplicity();
        });
        mult.push(current);

        mult
    }

    /// Check if the knot vector is clamped
    /// `clamped` means the first and last knots have a multiplicity greater than the degree
    /// e.g. [0, 0, 0, 1, 2, 3, 3, 3] with degree 2 is clamped
    pub fn is_clamped(&self, degree: usize) -> bool {
        let multiplicity = self.multiplicity();
        let start = multiplicity.first();
        let end = multiplicity.last();
        match (start, end) {
            (Some(start), Some(end)) => {
                start.multiplicity() > degree && end.multiplicity() > degree
            }
            _ => false,
        }
    }

    /// Find the knot span index by binary search
    ///
    /// # Example
    /// ```
    /// use blendcurve::prelude::KnotVector;
    /// let knots = KnotVector::new(vec![0., 0., 0., 1., 2., 3., 3., 3.]);
    /// let idx = knots.find_knot_span_index(6, 2, 2.5);
    /// assert_eq!(idx, 4);
    /// ```
    pub fn find_knot_span_index(&self, n: usize, degree: usize, u: T) -> usize {
        if u > self[n + 1] - T::default_epsilon() {
            return n;
        }

        if u < self[degree] + T::default_epsilon() {
            return degree;
        }

        // binary search
        let mut low = degree;
        let mut high = n + 1;
        let mut mid = ((low + high) as f64 / 2.).floor() as usize;
        while u < self[mid] || self[mid + 1] <= u {
            if u < self[mid] {
                high = mid;
            } else {
                low = mid;
            }
            let next = ((low + high) as f64 / 2.).floor() as usize;
            if mid == next {
                break;
            }
            mid = next;
        }

        mid
    }

    /// Compute the non-vanishing basis functions
    pub fn basis_functions(&self, knot_span_index: usize, u: T, degree: usize) -> Vec<T> {
        let mut basis_functions = vec![T::zero(); degree + 1];
        let mut left = vec![T::zero(); degree + 1];
        let mut right = vec![T::zero(); degree + 1];

        basis_functions[0] = T::one();

        for j in 1..=degree {
            left[j] = u - self[knot_span_index + 1 - j];
            right[j] = self[knot_span_index + j] - u;
            let mut saved = T::zero();

            for r in 0..j {
                let temp = basis_functions[r] / (right[r + 1] + left[j - r]);
                basis_functions[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }

            basis_functions[j] = saved;
        }

        basis_functions
    }

    /// Compute the non-vanishing basis functions and their derivatives
    /// 2d array of basis and derivative values of size (n+1, p+1) The nth row is the nth derivative and the first row is made up of the basis function values.
    pub fn derivative_basis_functions(
        &self,
        knot_index: usize,
        u: T,
        degree: usize,
        n: usize, // derivative order
    ) -> Vec<Vec<T>> {
        let mut ndu = vec![vec![T::zero(); degree + 1]; degree + 1];
        let mut left = vec![T::zero(); degree + 1];
        let mut right = vec![T::zero(); degree + 1];

        ndu[0][0] = T::one();

        for j in 1..=degree {
            left[j] = u - self[knot_index + 1 - j];
            right[j] = self[knot_index + j] - u;

            let mut saved = T::zero();
            for r in 0..j {
                // lower triangle
                ndu[j][r] = right[r + 1] + left[j - r];
                let temp = ndu[r][j - 1] / ndu[j][r];

                // upper triangle
                ndu[r][j] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            ndu[j][j] = saved;
        }

        let mut ders = vec![vec![T::zero(); degree + 1]; n + 1];
        let mut a = vec![vec![T::zero(); degree + 1]; 2];

        // load the basis functions
        for j in 0..=degree {
            ders[0][j] = ndu[j][degree];
        }

        let idegree = degree as isize;
        let n = n as isize;

        // compute the derivatives
        for r in 0..=idegree {
            // alternate rows in array a
            let mut s1 = 0;
            let mut s2 = 1;
            a[0][0] = T::one();

            // loop to compute the kth derivative
            for k in 1..=n {
                let mut d = T::zero();
                let rk = r - k;
                let pk = idegree - k;

                if r >= k {
                    a[s2][0] = a[s1][0] / ndu[(pk + 1) as usize][rk as usize];
                    d = a[s2][0] * ndu[rk as usize][pk as usize];
                }

                let j1 = if rk >= -1 { 1 } else { -rk };
                let j2 = if r - 1 <= pk { k - 1 } else { idegree - r };

                for j in j1..=j2 {
                    a[s2][j as usize] = (a[s1][j as usize] - a[s1][j as usize - 1])
                        / ndu[(pk + 1) as usize][(rk + j) as usize];
                    d += a[s2][j as usize] * ndu[(rk + j) as usize][pk as usize];
                }

                let uk = k as usize;
                let ur = r as usize;
                if r <= pk {
                    a[s2][uk] = -a[s1][(k - 1) as usize] / ndu[(pk + 1) as usize][ur];
                    d += a[s2][uk] * ndu[ur][pk as usize];
                }

                ders[uk][ur] = d;

                // switch rows
                std::mem::swap(&mut s1, &mut s2);
            }
        }

        let mut acc = idegree;
        for k in 1..=n {
            for j in 0..=idegree {
                ders[k as usize][j as usize] *= T::from_isize(acc).unwrap();
            }
            acc *= idegree - k;
        }
        ders
    }

    /// Cast the knot vector to another floating point type
    /// # Example
    /// ```
    /// use blendcurve::prelude::*;
    /// let knots: KnotVector<f64> = KnotVector::new(vec![1., 2., 3., 4., 5., 6.]);
    /// let knots2 = knots.cast::<f32>();
    /// assert_eq!(knots2.first(), 1.0);
    /// ```
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> KnotVector<F> {
        KnotVector::new(self.0.iter().map(|v| convert(*v)).collect())
    }
}

/// Mirror a parameter across the knot domain `[first, last]`,
/// the parameter image of reversing the underlying curve
pub fn reverse_parameter<T: RealField + Copy>(parameter: T, first: T, last: T) -> T {
    first + last - parameter
}

impl<T> Index<usize> for KnotVector<T> {
    type Output = T;
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<T> FromIterator<T> for KnotVector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T: FloatingPoint> Invertible for KnotVector<T> {
    /// Reverses the knot vector
    /// Every knot maps to `max + min - knot`, then the order is restored
    /// by reversing the sequence, so the domain is preserved.
    /// # Example
    /// ```
    /// use blendcurve::prelude::*;
    /// let mut knot = KnotVector::new(vec![0., 0., 0., 1., 2., 2.5, 3.5, 4.0, 4.0]);
    /// knot.invert();
    ///
    /// let dst = vec![0.0, 0.0, 0.5, 1.5, 2.0, 3.0, 4.0, 4.0, 4.0];
    /// knot.iter().enumerate().for_each(|(i, v)| {
    ///     assert_eq!(*v, dst[i]);
    /// });
    /// ```
    fn invert(&mut self) {
        let min = self.first();
        let max = self.last();
        let mut next: Vec<T> = self.0.iter().map(|k| max + min - *k).collect();
        next.reverse();
        self.0 = next;
    }
}

#[cfg(test)]
mod tests {
    use super::{reverse_parameter, KnotVector};
    use crate::misc::Invertible;

    #[test]
    fn invert_is_involutive() {
        let knots = KnotVector::new(vec![0., 0., 0., 1., 2., 2.5, 3.5, 4., 4.]);
        let twice = knots.inverted().inverted();
        assert_eq!(knots, twice);
    }

    #[test]
    fn scale_preserves_shape() {
        let knots = KnotVector::new(vec![1., 1., 2., 4., 4.]);
        let scaled = knots.try_scaled(7.5).unwrap();
        assert_eq!(
            knots.try_normalized().unwrap(),
            scaled.try_normalized().unwrap()
        );
        assert_eq!(scaled.first(), 0.);
        assert_eq!(scaled.last(), 7.5);
    }

    #[test]
    fn degenerate_range_is_rejected() {
        let knots = KnotVector::new(vec![2., 2., 2.]);
        assert!(knots.try_normalized().is_err());
        assert!(knots.try_scaled(3.).is_err());
    }

    #[test]
    fn clamped_uniform_multiplicities() {
        let knots: KnotVector<f64> = KnotVector::try_clamped_uniform(3, 6).unwrap();
        // nb_poles + degree + 1 knots in the expanded vector
        assert_eq!(knots.len(), 10);
        let mults = knots.multiplicity();
        assert_eq!(mults.first().unwrap().multiplicity(), 4);
        assert_eq!(mults.last().unwrap().multiplicity(), 4);
        assert!(knots.is_clamped(3));

        assert!(KnotVector::<f64>::try_clamped_uniform(4, 4).is_err());
        assert!(KnotVector::<f64>::try_clamped_uniform(5, 4).is_err());
    }

    #[test]
    fn reverse_parameter_mirrors_domain() {
        assert_eq!(reverse_parameter(0.25, 0., 1.), 0.75);
        assert_eq!(reverse_parameter(2., 1., 5.), 4.);
        // mirroring twice is the identity
        let p = reverse_parameter(reverse_parameter(0.3, 0., 2.), 0., 2.);
        assert_eq!(p, 0.3);
    }
}
