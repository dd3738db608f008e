//! Named request callbacks and the ordered lists that run them.
//!
//! A [`Hooks`] bundle holds one [`HookList`] per [`Phase`]. Lists share
//! their callbacks through `Arc`, so cloning a bundle is cheap and the
//! clone can be extended without touching the template it came from.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::Request;

/// Future returned by a hook callback, borrowing the request it runs on.
pub type HookFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

type Callback<I, O> = dyn for<'a> Fn(&'a mut Request<I, O>) -> HookFuture<'a> + Send + Sync;

/// Pipeline phases, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Validate,
    Build,
    Send,
    Unmarshal,
    Retry,
    Complete,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Validate,
        Phase::Build,
        Phase::Send,
        Phase::Unmarshal,
        Phase::Retry,
        Phase::Complete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Validate => "validate",
            Phase::Build => "build",
            Phase::Send => "send",
            Phase::Unmarshal => "unmarshal",
            Phase::Retry => "retry",
            Phase::Complete => "complete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named callback with full read/write access to a [`Request`].
///
/// Two hooks are equal when they share a name and the same callback
/// allocation, which is what clones of one hook do.
pub struct Hook<I, O> {
    name: String,
    callback: Arc<Callback<I, O>>,
}

impl<I, O> Hook<I, O> {
    /// Creates an async hook.
    ///
    /// ```no_run
    /// use reqhook::{Hook, Request};
    ///
    /// let hook: Hook<(), String> = Hook::new("tag", |request: &mut Request<(), String>| {
    ///     Box::pin(async move { request.data.push_str("tag:") })
    /// });
    /// ```
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request<I, O>) -> HookFuture<'a> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            callback: Arc::new(callback),
        }
    }

    /// Creates a hook from a synchronous callback.
    pub fn sync<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&mut Request<I, O>) + Send + Sync + 'static,
    {
        Self::new(name, move |request| {
            callback(request);
            let done: HookFuture<'_> = Box::pin(std::future::ready(()));
            done
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn call(&self, request: &mut Request<I, O>) {
        (self.callback)(request).await;
    }
}

impl<I, O> Clone for Hook<I, O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<I, O> PartialEq for Hook<I, O> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.callback, &other.callback)
    }
}

impl<I, O> fmt::Debug for Hook<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hook").field(&self.name).finish()
    }
}

/// Ordered sequence of hooks.
pub struct HookList<I, O> {
    hooks: Vec<Hook<I, O>>,
}

impl<I, O> HookList<I, O> {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn push_back(&mut self, hook: Hook<I, O>) {
        self.hooks.push(hook);
    }

    /// Prepends a hook; the most recently front-pushed hook runs first.
    pub fn push_front(&mut self, hook: Hook<I, O>) {
        self.hooks.insert(0, hook);
    }

    /// Removes the first hook equal to `hook`. Returns whether one was found.
    pub fn remove(&mut self, hook: &Hook<I, O>) -> bool {
        match self.hooks.iter().position(|candidate| candidate == hook) {
            Some(index) => {
                self.hooks.remove(index);
                true
            }
            None => false,
        }
    }

    /// Removes every hook with the given name. Returns how many were removed.
    pub fn remove_by_name(&mut self, name: &str) -> usize {
        let before = self.hooks.len();
        self.hooks.retain(|hook| hook.name != name);
        before - self.hooks.len()
    }

    pub fn clear(&mut self) {
        self.hooks.clear();
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Hook names in execution order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hooks.iter().map(Hook::name)
    }

    /// Runs every hook in order against the same request.
    ///
    /// An error recorded by one hook does not stop the rest of the list;
    /// the request driver checks the error once the list returns.
    pub async fn run(&self, request: &mut Request<I, O>) {
        for hook in &self.hooks {
            hook.call(request).await;
        }
    }
}

impl<I, O> Default for HookList<I, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, O> Clone for HookList<I, O> {
    fn clone(&self) -> Self {
        Self {
            hooks: self.hooks.clone(),
        }
    }
}

impl<I, O> fmt::Debug for HookList<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// One hook list per pipeline phase.
pub struct Hooks<I, O> {
    pub validate: HookList<I, O>,
    pub build: HookList<I, O>,
    pub send: HookList<I, O>,
    pub unmarshal: HookList<I, O>,
    pub retry: HookList<I, O>,
    pub complete: HookList<I, O>,
}

impl<I, O> Hooks<I, O> {
    pub fn new() -> Self {
        Self {
            validate: HookList::new(),
            build: HookList::new(),
            send: HookList::new(),
            unmarshal: HookList::new(),
            retry: HookList::new(),
            complete: HookList::new(),
        }
    }

    pub fn phase(&self, phase: Phase) -> &HookList<I, O> {
        match phase {
            Phase::Validate => &self.validate,
            Phase::Build => &self.build,
            Phase::Send => &self.send,
            Phase::Unmarshal => &self.unmarshal,
            Phase::Retry => &self.retry,
            Phase::Complete => &self.complete,
        }
    }

    pub fn phase_mut(&mut self, phase: Phase) -> &mut HookList<I, O> {
        match phase {
            Phase::Validate => &mut self.validate,
            Phase::Build => &mut self.build,
            Phase::Send => &mut self.send,
            Phase::Unmarshal => &mut self.unmarshal,
            Phase::Retry => &mut self.retry,
            Phase::Complete => &mut self.complete,
        }
    }

    /// True iff every phase list is empty.
    pub fn is_empty(&self) -> bool {
        Phase::ALL.iter().all(|phase| self.phase(*phase).is_empty())
    }
}

impl<I, O> Default for Hooks<I, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, O> Clone for Hooks<I, O> {
    fn clone(&self) -> Self {
        Self {
            validate: self.validate.clone(),
            build: self.build.clone(),
            send: self.send.clone(),
            unmarshal: self.unmarshal.clone(),
            retry: self.retry.clone(),
            complete: self.complete.clone(),
        }
    }
}

impl<I, O> fmt::Debug for Hooks<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("validate", &self.validate)
            .field("build", &self.build)
            .field("send", &self.send)
            .field("unmarshal", &self.unmarshal)
            .field("retry", &self.retry)
            .field("complete", &self.complete)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{Hook, HookList, Hooks, Phase};
    use crate::{Config, Operation, Request};

    fn request() -> Request<(), String> {
        Request::new(
            Arc::new(Config::new("http://127.0.0.1")),
            Operation::get("Tag", "/tag"),
            Hooks::new(),
            (),
            String::new(),
        )
    }

    fn tag(name: &'static str) -> Hook<(), String> {
        Hook::sync(name, move |request: &mut Request<(), String>| {
            request.data.push_str(name)
        })
    }

    #[tokio::test]
    async fn back_pushes_run_in_insertion_order() {
        let mut list = HookList::new();
        list.push_back(tag("H1"));
        list.push_back(tag("H2"));
        list.push_back(tag("H3"));

        let mut request = request();
        list.run(&mut request).await;
        assert_eq!(request.data, "H1H2H3");
    }

    #[tokio::test]
    async fn front_push_runs_first() {
        let mut list = HookList::new();
        list.push_back(tag("H1"));
        list.push_front(tag("H2"));
        list.push_front(tag("H3"));

        let mut request = request();
        list.run(&mut request).await;
        assert_eq!(request.data, "H3H2H1");
    }

    #[tokio::test]
    async fn async_hooks_are_awaited_in_order() {
        let mut list = HookList::new();
        list.push_back(Hook::new("slow", |request: &mut Request<(), String>| {
            Box::pin(async move {
                tokio::task::yield_now().await;
                request.data.push_str("slow:");
            })
        }));
        list.push_back(tag("fast:"));

        let mut request = request();
        list.run(&mut request).await;
        assert_eq!(request.data, "slow:fast:");
    }

    #[tokio::test]
    async fn run_does_not_stop_on_error() {
        let mut list = HookList::new();
        list.push_back(Hook::sync("fail", |request: &mut Request<(), String>| {
            request.error = Some(crate::Error::Build("nope".to_owned()));
        }));
        list.push_back(tag("after"));

        let mut request = request();
        list.run(&mut request).await;
        assert!(request.error.is_some());
        assert_eq!(request.data, "after");
    }

    #[test]
    fn remove_drops_a_single_instance() {
        let h1 = tag("H1");
        let h2 = tag("H2");
        let mut list = HookList::new();
        list.push_back(h2.clone());
        list.push_back(h1);
        list.push_back(h2.clone());
        list.push_back(tag("Hx"));

        assert!(list.remove(&h2));
        assert_eq!(list.len(), 3);
        assert_eq!(list.names().collect::<Vec<_>>(), vec!["H1", "H2", "Hx"]);
    }

    #[test]
    fn remove_matches_callback_identity_not_only_name() {
        let mut list = HookList::new();
        list.push_back(tag("H1"));
        assert!(!list.remove(&tag("H1")));
        assert_eq!(list.len(), 1);
        assert_eq!(list.remove_by_name("H1"), 1);
        assert!(list.is_empty());
    }

    #[test]
    fn cloned_list_is_independent() {
        let mut original = HookList::new();
        original.push_back(tag("H1"));
        let mut copy = original.clone();
        copy.push_back(tag("H2"));
        original.push_front(tag("H0"));

        assert_eq!(original.names().collect::<Vec<_>>(), vec!["H0", "H1"]);
        assert_eq!(copy.names().collect::<Vec<_>>(), vec!["H1", "H2"]);
    }

    #[test]
    fn cloned_bundle_is_independent() {
        let mut template = Hooks::new();
        template.build.push_back(tag("encode"));

        let mut copy = template.clone();
        copy.build.push_back(tag("header"));
        copy.complete.push_back(tag("log"));

        assert_eq!(template.build.len(), 1);
        assert!(template.complete.is_empty());
        assert_eq!(copy.build.len(), 2);
    }

    #[test]
    fn bundle_is_empty_iff_all_phases_are() {
        let mut hooks: Hooks<(), String> = Hooks::new();
        assert!(hooks.is_empty());

        hooks.phase_mut(Phase::Retry).push_back(tag("retry"));
        assert!(!hooks.is_empty());

        hooks.retry.clear();
        assert!(hooks.is_empty());
    }
}
