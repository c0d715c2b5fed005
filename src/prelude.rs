//! Re-imports for convenience
#[doc(no_inline)]
pub use crate::config::{ArcConfig, DataStats, PhoneLoopConfig, UnitGroupConfig};
#[doc(no_inline)]
pub use crate::dist::*;
#[doc(no_inline)]
pub use crate::model::*;
#[doc(no_inline)]
pub use crate::priors::*;
#[doc(no_inline)]
pub use crate::subspace::{Gsm, GsmStats, PdfLayout, UnitLatentPosteriors};
#[doc(no_inline)]
pub use crate::traits::*;
