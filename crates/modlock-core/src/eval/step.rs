/// Outcome of an operation that may have to wait for inputs that do not exist yet
///
/// `NotReady` is not a failure: the caller returns it upward unchanged and the
/// whole operation is attempted again once the missing inputs are available.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    Ready(T),
    NotReady,
}

impl<T> Step<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Step::Ready(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Step<U> {
        match self {
            Step::Ready(value) => Step::Ready(f(value)),
            Step::NotReady => Step::NotReady,
        }
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Step::Ready(value) => Some(value),
            Step::NotReady => None,
        }
    }
}

impl<T> From<Option<T>> for Step<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Step::Ready(value),
            None => Step::NotReady,
        }
    }
}

/// Unwrap a `Step`, returning `Ok(Step::NotReady)` from the enclosing function when it is not ready
#[macro_export]
macro_rules! ready {
    ($step:expr) => {
        match $step {
            $crate::eval::Step::Ready(value) => value,
            $crate::eval::Step::NotReady => return Ok($crate::eval::Step::NotReady),
        }
    };
}
