//! Parameter declarations and their Cartesian expansion.
//!
//! A [`ParameterSpace`] holds parameters in declaration order. Fixed
//! parameters carry a single value; unpacked parameters carry the sequence of
//! values to sweep. Combinations are enumerated in mixed-radix order over the
//! unpacked parameters: the first declared unpacked parameter varies slowest
//! and the last declared one varies fastest. Fixed parameters never affect the
//! combination index.
//!
//! ```text
//! SNR = [0, 5] (unpacked), blockSize = [4, 8, 16] (unpacked), rolloff = 0.3
//!
//! index 0: SNR=0, blockSize=4,  rolloff=0.3
//! index 1: SNR=0, blockSize=8,  rolloff=0.3
//! index 2: SNR=0, blockSize=16, rolloff=0.3
//! index 3: SNR=5, blockSize=4,  rolloff=0.3
//! ...
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DeclarationError, ResumeMismatch};

use super::value::ParamValue;

/// A named parameter, either fixed or unpacked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    name: String,
    values: Vec<ParamValue>,
    unpacked: bool,
}

impl Parameter {
    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared values (a single value for fixed parameters).
    pub fn values(&self) -> &[ParamValue] {
        &self.values
    }

    /// Whether this parameter is swept.
    pub fn is_unpacked(&self) -> bool {
        self.unpacked
    }

    /// Number of distinct values this parameter contributes to the product.
    fn radix(&self) -> usize {
        if self.unpacked {
            self.values.len()
        } else {
            1
        }
    }

    fn validate(&self) -> Result<(), DeclarationError> {
        match (self.unpacked, self.values.len()) {
            (true, 0) => Err(DeclarationError::EmptyUnpackDomain(self.name.clone())),
            (false, 0) => Err(DeclarationError::EmptyFixedValue(self.name.clone())),
            (false, count) if count > 1 => Err(DeclarationError::AmbiguousFixedValue {
                name: self.name.clone(),
                count,
            }),
            _ => Ok(()),
        }
    }
}

/// Ordered collection of parameter declarations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Parameter>", into = "Vec<Parameter>")]
pub struct ParameterSpace {
    parameters: Vec<Parameter>,
}

impl ParameterSpace {
    /// Create an empty parameter space.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter.
    ///
    /// Fails with [`DeclarationError::DuplicateName`] if the name is taken,
    /// and rejects empty unpacked domains and multi-valued fixed parameters.
    pub fn add_parameter<I, V>(
        &mut self,
        name: impl Into<String>,
        values: I,
        unpack: bool,
    ) -> Result<(), DeclarationError>
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        let parameter = Parameter {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
            unpacked: unpack,
        };
        if self.position(&parameter.name).is_some() {
            return Err(DeclarationError::DuplicateName(parameter.name));
        }
        parameter.validate()?;
        self.parameters.push(parameter);
        Ok(())
    }

    /// Declare a fixed parameter with a single value.
    pub fn add_fixed(
        &mut self,
        name: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Result<(), DeclarationError> {
        let value: ParamValue = value.into();
        self.add_parameter(name, [value], false)
    }

    /// Declare an unpacked parameter sweeping `values`.
    pub fn add_unpacked<I, V>(
        &mut self,
        name: impl Into<String>,
        values: I,
    ) -> Result<(), DeclarationError>
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        self.add_parameter(name, values, true)
    }

    /// Builder-style variant of [`add_fixed`](Self::add_fixed).
    pub fn with_fixed(
        mut self,
        name: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Result<Self, DeclarationError> {
        self.add_fixed(name, value)?;
        Ok(self)
    }

    /// Builder-style variant of [`add_unpacked`](Self::add_unpacked).
    pub fn with_unpacked<I, V>(
        mut self,
        name: impl Into<String>,
        values: I,
    ) -> Result<Self, DeclarationError>
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        self.add_unpacked(name, values)?;
        Ok(self)
    }

    /// Toggle whether a declared parameter is swept.
    ///
    /// Packing a parameter that holds several values is rejected, as is
    /// unpacking one whose domain is empty.
    pub fn set_unpacked(&mut self, name: &str, unpack: bool) -> Result<(), DeclarationError> {
        let idx = self
            .position(name)
            .ok_or_else(|| DeclarationError::UnknownParameter(name.to_string()))?;
        let mut candidate = self.parameters[idx].clone();
        candidate.unpacked = unpack;
        candidate.validate()?;
        self.parameters[idx] = candidate;
        Ok(())
    }

    /// Remove a parameter, returning its declaration.
    pub fn remove_parameter(&mut self, name: &str) -> Result<Parameter, DeclarationError> {
        let idx = self
            .position(name)
            .ok_or_else(|| DeclarationError::UnknownParameter(name.to_string()))?;
        Ok(self.parameters.remove(idx))
    }

    /// Look up a parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.position(name).map(|idx| &self.parameters[idx])
    }

    /// All parameters in declaration order.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Names of the unpacked parameters in declaration order.
    pub fn unpacked_names(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.unpacked)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Names of the fixed parameters in declaration order.
    pub fn fixed_names(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| !p.unpacked)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Number of combinations, i.e. the product of unpacked domain sizes.
    ///
    /// Computed from the declarations alone; saturates at `usize::MAX`.
    pub fn combination_count(&self) -> usize {
        self.parameters
            .iter()
            .fold(1usize, |acc, p| acc.saturating_mul(p.radix()))
    }

    /// Lazily enumerate all combinations in index order.
    pub fn combinations(&self) -> Combinations<'_> {
        Combinations {
            space: self,
            next: 0,
            count: self.combination_count(),
        }
    }

    /// The combination at `index`, or `None` past the end.
    pub fn combination_at(&self, index: usize) -> Option<Combination> {
        if index >= self.combination_count() {
            return None;
        }

        // Mixed-radix decomposition, last declared parameter least significant.
        let mut digits = vec![0usize; self.parameters.len()];
        let mut rem = index;
        for (slot, parameter) in self.parameters.iter().enumerate().rev() {
            let radix = parameter.radix();
            digits[slot] = rem % radix;
            rem /= radix;
        }

        let assignment = self
            .parameters
            .iter()
            .zip(digits)
            .map(|(p, digit)| (p.name.clone(), p.values[digit].clone()))
            .collect();

        Some(Combination { index, assignment })
    }

    /// Indices of the combinations matching every `(name, value)` pair.
    ///
    /// Fails if a name is not declared.
    pub fn indexes_matching(
        &self,
        filter: &[(&str, ParamValue)],
    ) -> Result<Vec<usize>, DeclarationError> {
        for (name, _) in filter {
            if self.position(name).is_none() {
                return Err(DeclarationError::UnknownParameter(name.to_string()));
            }
        }
        Ok(self
            .combinations()
            .filter(|c| c.matches(filter))
            .map(|c| c.index())
            .collect())
    }

    /// Check that `other` declares exactly the same parameters.
    ///
    /// Used when resuming: a checkpoint taken under another declaration would
    /// assign different meanings to the same combination indices.
    pub fn ensure_same_declaration(&self, other: &ParameterSpace) -> Result<(), ResumeMismatch> {
        if self.parameters.len() != other.parameters.len() {
            return Err(ResumeMismatch::Parameters(format!(
                "{} parameters declared, checkpoint has {}",
                self.parameters.len(),
                other.parameters.len()
            )));
        }
        for (mine, theirs) in self.parameters.iter().zip(&other.parameters) {
            if mine.name != theirs.name {
                return Err(ResumeMismatch::Parameters(format!(
                    "expected parameter '{}', checkpoint has '{}'",
                    mine.name, theirs.name
                )));
            }
            if mine.unpacked != theirs.unpacked {
                return Err(ResumeMismatch::Parameters(format!(
                    "parameter '{}' unpack flag differs",
                    mine.name
                )));
            }
            if mine.values != theirs.values {
                return Err(ResumeMismatch::Parameters(format!(
                    "parameter '{}' values differ",
                    mine.name
                )));
            }
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p.name == name)
    }
}

impl TryFrom<Vec<Parameter>> for ParameterSpace {
    type Error = DeclarationError;

    fn try_from(parameters: Vec<Parameter>) -> Result<Self, Self::Error> {
        let mut space = ParameterSpace::new();
        for p in parameters {
            space.add_parameter(p.name, p.values, p.unpacked)?;
        }
        Ok(space)
    }
}

impl From<ParameterSpace> for Vec<Parameter> {
    fn from(space: ParameterSpace) -> Self {
        space.parameters
    }
}

/// One concrete assignment of a value to every parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combination {
    index: usize,
    assignment: Vec<(String, ParamValue)>,
}

impl Combination {
    /// Stable index of this combination within its parameter space.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Value assigned to `name`.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.assignment
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Numeric value assigned to `name`.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ParamValue::as_f64)
    }

    /// Integer value assigned to `name`.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ParamValue::as_i64)
    }

    /// `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.assignment.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Whether every `(name, value)` pair in `filter` holds for this combination.
    pub fn matches(&self, filter: &[(&str, ParamValue)]) -> bool {
        filter
            .iter()
            .all(|(name, value)| self.get(name) == Some(value))
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} [", self.index)?;
        for (i, (name, value)) in self.assignment.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        write!(f, "]")
    }
}

/// Iterator over the combinations of a [`ParameterSpace`].
#[derive(Debug, Clone)]
pub struct Combinations<'a> {
    space: &'a ParameterSpace,
    next: usize,
    count: usize,
}

impl Iterator for Combinations<'_> {
    type Item = Combination;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let combination = self.space.combination_at(self.next);
        self.next += 1;
        combination
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Combinations<'_> {}
