use std::sync::{Arc, RwLock};

use crate::error::{SmallError, SmallResult};

// Type alias, not a new type, cannot define methods on it.
pub type Pod<T> = Arc<RwLock<T>>;

pub type ResultPod<T> = Result<Pod<T>, SmallError>;

/// Alias for call sites that only care about success/failure.
pub type VoidResult = SmallResult<()>;
