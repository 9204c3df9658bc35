//! Domain models for launch risk assessment

pub mod assessment;
pub mod signals;
pub mod token;

pub use assessment::{
    AssessmentRecord, FactorName, FactorResult, FactorScore, FactorStatus, FailureKind,
    FailureRecord, RiskAssessment, RiskLevel, RiskSignal,
};
pub use signals::{
    AddressHistory, ContractSignals, CreatorProfile, FlagSeverity, FollowerBucket, FunctionFlag,
    LiquidityState, OwnerStatus, PoolState, SocialMetadata, SocialSignals, SourceInfo,
    TransferEvent, TransferPattern,
};
pub use token::{Chain, ChainFamily, TokenLaunch};
