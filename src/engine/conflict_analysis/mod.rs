pub(crate) mod conflict_analysis_context;
pub(crate) mod resolution_conflict_analyser;

pub(crate) use conflict_analysis_context::ConflictAnalysisContext;
pub(crate) use resolution_conflict_analyser::ConflictAnalysisResult;
pub(crate) use resolution_conflict_analyser::ResolutionConflictAnalyser;
