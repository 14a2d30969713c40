use super::TheoryContext;
use crate::basic_types::PropagationStatus;
use crate::engine::sat::AssignmentsPropositional;
use crate::engine::sat::ClauseRelocationMap;
use crate::engine::variables::Literal;

/// The interface every theory module exposes to the coordinator. Modules
/// observe the shared trail through incremental [`TheoryPropagator::propagate`]
/// notifications and are polled at clausal fixpoint through
/// [`TheoryPropagator::propagate_fixpoint`]; conflicts are reported as
/// clauses, never as errors.
///
/// Ordering contract: a module receives `propagate(l)` before it may enqueue
/// any literal whose explanation cites `l`, and on `notify_backtrack(level)`
/// it must drop every antecedent it attached to literals above `level`
/// before returning.
pub(crate) trait TheoryPropagator {
    /// The name of the module, used for logging.
    fn name(&self) -> &str;

    /// Incremental notification that `literal` was assigned true on the
    /// trail. Only called for literals the module registered in the theory
    /// watch list. The module may enqueue propagations through the context.
    fn propagate(
        &mut self,
        context: &mut TheoryContext<'_>,
        literal: Literal,
    ) -> PropagationStatus;

    /// Called when the clausal propagator reaches fixpoint. The coordinator
    /// keeps polling modules (restarting at the clausal propagator after
    /// every theory enqueue) until no module propagates anything further.
    fn propagate_fixpoint(&mut self, context: &mut TheoryContext<'_>) -> PropagationStatus;

    /// Called when the brancher has no decision left. Modules whose checks
    /// are deferred (the lazy unfounded-set policy) run them here.
    fn propagate_total_assignment(
        &mut self,
        context: &mut TheoryContext<'_>,
    ) -> PropagationStatus {
        self.propagate_fixpoint(context)
    }

    /// Produce the reason clause for a literal this module propagated.
    /// `payload` is the opaque tag the module attached when enqueueing. The
    /// returned clause has `literal` in first position and every other
    /// literal false at strictly earlier trail positions.
    fn explain(
        &self,
        assignments: &AssignmentsPropositional,
        literal: Literal,
        payload: u32,
    ) -> Vec<Literal>;

    fn notify_new_decision_level(&mut self);

    /// Undo all internal state above `level`. Reason payloads referring to
    /// unassigned literals must be released here.
    fn notify_backtrack(&mut self, level: usize);

    /// Rewrite any clause references the module retains after an arena
    /// relocation pass.
    fn relocate(&mut self, map: &ClauseRelocationMap);
}
