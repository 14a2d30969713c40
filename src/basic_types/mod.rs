mod clause_reference;
mod conflict_info;
mod constraint_reference;
mod error;
mod key_value;
pub(crate) mod statistic_logging;
mod weight;

pub(crate) use clause_reference::ClauseReference;
pub(crate) use conflict_info::ConflictInfo;
pub(crate) use conflict_info::PropagationStatus;
pub(crate) use constraint_reference::ConstraintReference;
pub use error::ConstraintOperationError;
pub use error::MalformedInputError;
pub use error::ResourceError;
pub(crate) use key_value::KeyedVec;
pub(crate) use key_value::StorageKey;
pub(crate) use weight::checked_add;
pub(crate) use weight::checked_mul;
pub use weight::Weight;
pub(crate) use weight::WeightOverflow;

pub(crate) type HashMap<K, V> = fnv::FnvHashMap<K, V>;
pub(crate) type HashSet<K> = fnv::FnvHashSet<K>;
