pub mod answer;
pub mod id_alias;
pub mod item;
pub mod loaders;
pub mod results;
pub mod upload_record;

pub use id_alias::IdAliasMap;
pub use item::{GradedItem, Item, ItemKind, ItemStatus, QuestionType, RawItem, WrongItem};
pub use loaders::{load_all_toml_files, load_toml_to_item_set, ItemSet};
pub use results::{
    AnswerSource, CorrectionResult, CorrectionRound, GradingReport, GradingSummary, ItemCorrection,
    ItemOutcome, OutcomeStatus, Progress, ResolutionResult, RunResult,
};
pub use upload_record::UploadRecord;
