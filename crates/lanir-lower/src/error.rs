use lanir_core::{IrError, RegId, SsaId, VarId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LowerError {
    #[error("phi {0} reached lowering; convert out of SSA first")]
    PhiNotLowered(SsaId),
    #[error("SSA value {0} written twice")]
    SsaRedefined(SsaId),
    #[error("SSA value {0} read before it was written")]
    SsaUndefined(SsaId),
    #[error("SSA value {id} outside the function's {alloc} allocated indices")]
    SsaOutOfRange { id: SsaId, alloc: u32 },
    #[error("unknown register {0}")]
    UnknownRegister(RegId),
    #[error("unknown variable {0}")]
    UnknownVariable(VarId),
    #[error("invalid deref of '{var}': {reason}")]
    InvalidDeref { var: String, reason: String },
    #[error("malformed instruction: {0}")]
    Malformed(String),
    #[error("unsupported type: {0}")]
    UnsupportedType(String),
    #[error("unsupported operation: {0}")]
    UnsupportedOp(String),
    #[error("function not found: {0}")]
    FunctionNotFound(String),
}

impl LowerError {
    /// True for malformed input, false for well-formed input the engine does not handle.
    pub fn is_integrity_violation(&self) -> bool {
        !matches!(
            self,
            LowerError::UnsupportedType(_) | LowerError::UnsupportedOp(_)
        )
    }
}

impl From<IrError> for LowerError {
    fn from(err: IrError) -> Self {
        match err {
            IrError::TypeError(msg) => LowerError::UnsupportedType(msg),
            IrError::FunctionNotFound(name) => LowerError::FunctionNotFound(name),
            other => LowerError::Malformed(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, LowerError>;
