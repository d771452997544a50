//! Hyperlinks discovered on the last poll

use std::fmt;

use tracing::warn;

use crate::models::controller::{Link, Links};

/// Capacity of a link buffer in bytes
pub const LINK_CAPACITY: usize = 512;

/// Capacity of the artifact download reference in bytes
pub const ARTIFACT_HREF_CAPACITY: usize = 1024;

/// Owned text limited to `N` bytes.
///
/// Longer input is cut at the last character boundary that fits.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BoundedText<const N: usize> {
    text: String,
}

impl<const N: usize> BoundedText<N> {
    pub const CAPACITY: usize = N;

    pub fn new() -> Self {
        Self {
            text: String::new(),
        }
    }

    /// Replace the content; returns true if the value had to be truncated
    pub fn set(&mut self, value: &str) -> bool {
        self.text.clear();
        if value.len() <= N {
            self.text.push_str(value);
            return false;
        }
        let mut end = N;
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        self.text.push_str(&value[..end]);
        true
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Take the content, leaving the buffer empty
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }
}

impl<const N: usize> fmt::Debug for BoundedText<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.text, f)
    }
}

/// Outstanding work signalled by the server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSet {
    pub config_data: BoundedText<LINK_CAPACITY>,
    pub deployment_base: BoundedText<LINK_CAPACITY>,
    pub cancel_action: BoundedText<LINK_CAPACITY>,
}

impl LinkSet {
    /// Overwrite every link from a poll reply; absent links become empty
    pub fn refresh(&mut self, links: Option<&Links>) {
        let (deployment_base, config_data, cancel_action) = match links {
            Some(links) => (
                Link::href_of(&links.deployment_base),
                Link::href_of(&links.config_data),
                Link::href_of(&links.cancel_action),
            ),
            None => ("", "", ""),
        };

        store("deploymentBase", &mut self.deployment_base, deployment_base);
        store("configData", &mut self.config_data, config_data);
        store("cancelAction", &mut self.cancel_action, cancel_action);
    }
}

fn store<const N: usize>(name: &str, slot: &mut BoundedText<N>, href: &str) {
    if slot.set(href) {
        warn!("{} link longer than {} bytes was truncated", name, N);
    }
}
