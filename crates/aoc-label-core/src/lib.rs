pub mod compress;
pub mod fallback;
pub mod label_contracts;
pub mod normalize;
pub mod prompt;
pub mod synth;

pub use compress::compress_label;
pub use fallback::fallback_label;
pub use label_contracts::{
    ConfigError, LabelConfig, LabelRecord, LabelSource, PersistenceMode, FALLBACK_LABEL,
    LABEL_SCHEMA_VERSION,
};
pub use normalize::normalize_label;
pub use prompt::{build_label_prompt, LabelPrompt};
pub use synth::{
    CandidateError, CandidateFailureKind, CandidateSource, LabelOrigin, LabelSynthesizer,
    SynthesisSettings, SynthesizedLabel,
};
