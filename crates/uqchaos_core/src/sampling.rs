//! Node sampling
//!
//! Quasi-random and Latin hypercube schemes produce unit-hypercube points
//! that are pushed through the inverse CDFs of the basis-space marginals.
//! The `Random` scheme draws directly from the marginals.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::config::SamplingScheme;
use crate::distribution::JointDistribution;
use crate::model::ParameterAssignment;

/// Unit samples are kept inside `(UNIT_EPSILON, 1 - UNIT_EPSILON)`
const UNIT_EPSILON: f64 = 1e-10;

const PRIMES: [u64; 32] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
    101, 103, 107, 109, 113, 127, 131,
];

/// Sample points of one run. Rows are nodes, columns are the varied parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeBatch {
    names: Vec<String>,
    /// Coordinates the surrogate is fitted against
    basis: Vec<Vec<f64>>,
    /// Coordinates the model sees
    parameters: Vec<Vec<f64>>,
}

impl NodeBatch {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn basis_points(&self) -> &[Vec<f64>] {
        &self.basis
    }

    pub fn parameter_points(&self) -> &[Vec<f64>] {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.basis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.basis.is_empty()
    }

    /// Assignment for node `index`: nominal values overridden by the node's coordinates
    pub fn assignment(&self, index: usize, nominal: &ParameterAssignment) -> ParameterAssignment {
        let mut assignment = nominal.clone();
        for (name, value) in self.names.iter().zip(&self.parameters[index]) {
            assignment.set(name, *value);
        }
        assignment
    }

    /// Keep only the rows selected by `keep`
    pub fn restrict(&self, keep: &[bool]) -> Vec<Vec<f64>> {
        self.basis
            .iter()
            .zip(keep)
            .filter(|(_, k)| **k)
            .map(|(row, _)| row.clone())
            .collect()
    }
}

/// Draw `count` nodes from `joint` under `scheme`
pub fn sample_nodes<R: Rng + ?Sized>(
    joint: &JointDistribution,
    count: usize,
    scheme: SamplingScheme,
    rng: &mut R,
) -> NodeBatch {
    let dimension = joint.dimension();
    let basis: Vec<Vec<f64>> = match scheme {
        SamplingScheme::Random => (0..count).map(|_| joint.sample_basis_point(rng)).collect(),
        SamplingScheme::Halton => unit_to_basis(joint, halton(count, dimension)),
        SamplingScheme::Hammersley => unit_to_basis(joint, hammersley(count, dimension)),
        SamplingScheme::LatinHypercube => {
            unit_to_basis(joint, latin_hypercube(count, dimension, rng))
        }
    };
    let parameters = basis.iter().map(|p| joint.to_parameter_space(p)).collect();

    NodeBatch {
        names: joint.names().to_vec(),
        basis,
        parameters,
    }
}

fn unit_to_basis(joint: &JointDistribution, unit: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
    unit.into_iter()
        .map(|u| joint.basis_point_from_unit(&u))
        .collect()
}

fn clamp_unit(u: f64) -> f64 {
    u.clamp(UNIT_EPSILON, 1.0 - UNIT_EPSILON)
}

/// Van der Corput radical inverse of `index` in `base`
fn radical_inverse(mut index: u64, base: u64) -> f64 {
    let inv_base = 1.0 / base as f64;
    let mut factor = inv_base;
    let mut result = 0.0;
    while index > 0 {
        result += (index % base) as f64 * factor;
        index /= base;
        factor *= inv_base;
    }
    result
}

/// The `dimension`-th prime (zero-based), so every coordinate gets its own base
fn prime(dimension: usize) -> u64 {
    if let Some(p) = PRIMES.get(dimension) {
        return *p;
    }
    let mut found = PRIMES.len() - 1;
    let mut candidate = PRIMES[found];
    while found < dimension {
        candidate += 2;
        if is_prime(candidate) {
            found += 1;
        }
    }
    candidate
}

fn is_prime(n: u64) -> bool {
    n >= 2 && (2..).take_while(|d| d * d <= n).all(|d| n % d != 0)
}

/// Halton sequence, starting at index 1 to skip the origin
pub fn halton(count: usize, dimension: usize) -> Vec<Vec<f64>> {
    (0..count)
        .map(|i| {
            (0..dimension)
                .map(|d| clamp_unit(radical_inverse(i as u64 + 1, prime(d))))
                .collect()
        })
        .collect()
}

/// Hammersley set: an evenly spaced first coordinate, Halton for the rest
pub fn hammersley(count: usize, dimension: usize) -> Vec<Vec<f64>> {
    (0..count)
        .map(|i| {
            let mut point = Vec::with_capacity(dimension);
            point.push(clamp_unit((i as f64 + 1.0) / (count as f64 + 1.0)));
            for d in 1..dimension {
                point.push(clamp_unit(radical_inverse(i as u64 + 1, prime(d - 1))));
            }
            point
        })
        .collect()
}

/// Latin hypercube: one point per stratum in every dimension, strata shuffled
pub fn latin_hypercube<R: Rng + ?Sized>(
    count: usize,
    dimension: usize,
    rng: &mut R,
) -> Vec<Vec<f64>> {
    let mut points = vec![Vec::with_capacity(dimension); count];
    for _ in 0..dimension {
        let mut strata: Vec<usize> = (0..count).collect();
        strata.shuffle(rng);
        for (point, stratum) in points.iter_mut().zip(strata) {
            let offset: f64 = rng.random();
            point.push(clamp_unit((stratum as f64 + offset) / count as f64));
        }
    }
    points
}
