//! Mapping between the parameters of a unit and its pdf vector
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::{DMatrix, DVector};

use super::SubspaceError;
use crate::misc::softmax;
use crate::model::{CovarianceKind, Mixture, NormalPrior};
use crate::priors::{
    DirichletPrior, IsoNormalGammaPrior, NormalGammaPrior, NormalWishartPrior,
    PriorError,
};
use crate::traits::ExpFamilyPrior;

/// What a slot of the pdf vector encodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum SlotKind {
    /// The mixture weights of a state
    Weights,
    /// A Normal component of a state
    Normal(CovarianceKind),
}

/// A parameter of a unit and its place in the pdf vector
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct Slot {
    pub state: usize,
    /// `None` for the weights
    pub component: Option<usize>,
    pub kind: SlotKind,
    /// Number of components for the weights, data dimension otherwise
    pub dim: usize,
    pub offset: usize,
    pub len: usize,
}

impl SlotKind {
    fn pdfvec_len(&self, dim: usize) -> usize {
        match self {
            Self::Weights => dim,
            Self::Normal(CovarianceKind::Diagonal) => 2 * dim,
            Self::Normal(CovarianceKind::Isotropic) => dim + 1,
            Self::Normal(CovarianceKind::Full) => dim + dim * (dim + 1) / 2,
        }
    }
}

/// Parameter table shared by every unit modeled by a subspace.
///
/// A unit is a run of `n_states` consecutive mixtures. Its pdf vector is the
/// concatenation, state after state, of the weights slot followed by one
/// slot per component.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct PdfLayout {
    n_states: usize,
    slots: Vec<Slot>,
    len: usize,
}

impl PdfLayout {
    /// Layout of the parameters of `unit`
    pub fn from_unit(unit: &[Mixture]) -> Result<Self, SubspaceError> {
        if unit.is_empty() {
            return Err(SubspaceError::NoStates);
        }
        let mut slots = Vec::new();
        let mut offset = 0;
        let mut push = |state, component, kind: SlotKind, dim| {
            let len = kind.pdfvec_len(dim);
            slots.push(Slot {
                state,
                component,
                kind,
                dim,
                offset,
                len,
            });
            offset += len;
        };
        for (state, mixture) in unit.iter().enumerate() {
            push(state, None, SlotKind::Weights, mixture.n_components());
            for (k, comp) in mixture.components().iter().enumerate() {
                push(state, Some(k), SlotKind::Normal(comp.kind()), comp.dim());
            }
        }
        Ok(PdfLayout {
            n_states: unit.len(),
            slots,
            len: offset,
        })
    }

    /// Length of the pdf vectors
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn n_states(&self) -> usize {
        self.n_states
    }

    #[inline]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Number of units in `emissions`
    pub fn n_units(&self, emissions: &[Mixture]) -> Result<usize, SubspaceError> {
        if emissions.len() % self.n_states != 0 {
            Err(SubspaceError::UnitStateMismatch {
                n_emissions: emissions.len(),
                n_units: emissions.len() / self.n_states,
                n_states: self.n_states,
            })
        } else {
            Ok(emissions.len() / self.n_states)
        }
    }

    /// Check that `n_units` units of this layout make up `emissions`
    pub fn check_units(
        &self,
        emissions: &[Mixture],
        n_units: usize,
    ) -> Result<(), SubspaceError> {
        if n_units * self.n_states != emissions.len() {
            return Err(SubspaceError::UnitStateMismatch {
                n_emissions: emissions.len(),
                n_units,
                n_states: self.n_states,
            });
        }
        for (unit_ix, unit) in emissions.chunks(self.n_states).enumerate() {
            if &PdfLayout::from_unit(unit)? != self {
                return Err(SubspaceError::LayoutMismatch { unit: unit_ix });
            }
        }
        Ok(())
    }

    fn check_unit(&self, unit: &[Mixture]) -> Result<(), SubspaceError> {
        if &PdfLayout::from_unit(unit)? == self {
            Ok(())
        } else {
            Err(SubspaceError::LayoutMismatch { unit: 0 })
        }
    }

    /// Pdf vector of the posterior parameters of `unit`
    pub fn encode(&self, unit: &[Mixture]) -> Result<DVector<f64>, SubspaceError> {
        self.check_unit(unit)?;
        let mut pdfvec = DVector::zeros(self.len);
        for slot in self.slots.iter() {
            let mixture = &unit[slot.state];
            let values = match slot.component {
                None => weights_pdfvec(mixture.weights_parameter().posterior()),
                Some(k) => {
                    normal_pdfvec(mixture.components()[k].parameter().posterior())?
                }
            };
            pdfvec.rows_mut(slot.offset, slot.len).copy_from(&values);
        }
        Ok(pdfvec)
    }

    /// Replace the priors of `unit` by the ones implied by `pdfvec`.
    ///
    /// Every posterior becomes its new prior plus the parameter's statistics.
    pub fn decode_into(
        &self,
        unit: &mut [Mixture],
        pdfvec: &[f64],
    ) -> Result<(), SubspaceError> {
        if pdfvec.len() != self.len {
            return Err(SubspaceError::PdfVecDimension {
                expected: self.len,
                found: pdfvec.len(),
            });
        }
        self.check_unit(unit)?;
        for (state, mixture) in unit.iter_mut().enumerate() {
            let slots: Vec<&Slot> =
                self.slots.iter().filter(|s| s.state == state).collect();
            mixture.with_parameters_mut(|weights, components| {
                for slot in slots {
                    let values = &pdfvec[slot.offset..slot.offset + slot.len];
                    match slot.component {
                        None => {
                            let prior = dirichlet_from_pdfvec(weights.prior(), values)?;
                            weights.replace_prior(prior)?;
                        }
                        Some(k) => {
                            let param = components[k].parameter_mut();
                            let prior = normal_prior_from_pdfvec(param.prior(), values)?;
                            param.replace_prior(prior)?;
                        }
                    }
                }
                Ok::<(), SubspaceError>(())
            })?;
        }
        Ok(())
    }
}

/// ln E[π]
pub fn weights_pdfvec(dirichlet: &DirichletPrior) -> DVector<f64> {
    dirichlet.expected_weights().map(f64::ln)
}

/// Dirichlet with the total concentration of `template` and the expected
/// weights `softmax(values)`
pub fn dirichlet_from_pdfvec(
    template: &DirichletPrior,
    values: &[f64],
) -> Result<DirichletPrior, PriorError> {
    let total = template.alphas().sum();
    let weights = softmax(&DVector::from_column_slice(values));
    DirichletPrior::new(weights.iter().map(|w| total * w).collect())
}

/// Mean followed by an encoding of E[Λ]
pub fn normal_pdfvec(prior: &NormalPrior) -> Result<DVector<f64>, PriorError> {
    let dim = prior.ndim();
    let precision_part = match prior {
        NormalPrior::Diagonal(ng) => ng.expected_precision().map(f64::ln),
        NormalPrior::Isotropic(ing) => {
            DVector::from_element(1, ing.expected_precision().ln())
        }
        NormalPrior::Full(nw) => {
            let chol = nw
                .expected_precision()
                .cholesky()
                .ok_or(PriorError::NotPositiveDefinite)?;
            vech_ln_diag(&chol.l())
        }
    };
    let mut pdfvec = DVector::zeros(dim + precision_part.len());
    pdfvec.rows_mut(0, dim).copy_from(prior.mean());
    pdfvec.rows_mut(dim, precision_part.len()).copy_from(&precision_part);
    Ok(pdfvec)
}

/// Prior of the same kind and strength as `template` whose mean and
/// expected precision are read from `values`
pub fn normal_prior_from_pdfvec(
    template: &NormalPrior,
    values: &[f64],
) -> Result<NormalPrior, PriorError> {
    let dim = template.ndim();
    let mean = DVector::from_column_slice(&values[..dim]);
    let rest = &values[dim..];
    match template {
        NormalPrior::Diagonal(ng) => {
            let rates = DVector::from_iterator(
                dim,
                rest.iter().map(|ln_prec| ng.shape() / ln_prec.exp()),
            );
            NormalGammaPrior::new(mean, ng.scale(), ng.shape(), rates)
                .map(NormalPrior::Diagonal)
        }
        NormalPrior::Isotropic(ing) => {
            let rate = ing.shape() / rest[0].exp();
            IsoNormalGammaPrior::new(mean, ing.scale(), ing.shape(), rate)
                .map(NormalPrior::Isotropic)
        }
        NormalPrior::Full(nw) => {
            let l = unvech_exp_diag(rest, dim);
            let precision = &l * l.transpose();
            NormalWishartPrior::new(mean, nw.scale(), precision / nw.dof(), nw.dof())
                .map(NormalPrior::Full)
        }
    }
}

/// Column-major lower triangle with the log of the diagonal
fn vech_ln_diag(l: &DMatrix<f64>) -> DVector<f64> {
    let d = l.nrows();
    let mut out = Vec::with_capacity(d * (d + 1) / 2);
    for j in 0..d {
        out.push(l[(j, j)].ln());
        out.extend((j + 1..d).map(|i| l[(i, j)]));
    }
    DVector::from_vec(out)
}

fn unvech_exp_diag(values: &[f64], d: usize) -> DMatrix<f64> {
    let mut l = DMatrix::zeros(d, d);
    let mut it = values.iter();
    for j in 0..d {
        for i in j..d {
            let v = it.next().copied().unwrap_or(0.0);
            l[(i, j)] = if i == j { v.exp() } else { v };
        }
    }
    l
}
