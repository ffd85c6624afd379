//! The render target: mount point, document title, meta description, and the
//! navigation bar's active entry.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub trait Surface: Send + Sync {
    /// Replace everything in the mount point with `markup`.
    fn mount(&self, markup: &str);

    /// Current contents of the mount point.
    fn markup(&self) -> String;

    fn set_title(&self, title: &str);

    fn title(&self) -> String;

    fn set_description(&self, description: &str);

    /// Highlight the navigation entry for `path`.
    fn set_active_nav(&self, path: &str);
}

#[derive(Debug, Default, Clone)]
struct Page {
    markup: String,
    title: String,
    description: String,
    active_nav: Option<String>,
    mounts: usize,
}

/// Surface that keeps everything in memory, for tests and the shell.
#[derive(Default)]
pub struct MemorySurface {
    page: Mutex<Page>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(&self) -> String {
        self.lock().description.clone()
    }

    pub fn active_nav(&self) -> Option<String> {
        self.lock().active_nav.clone()
    }

    /// How many times `mount` has been called.
    pub fn mount_count(&self) -> usize {
        self.lock().mounts
    }

    fn lock(&self) -> MutexGuard<'_, Page> {
        self.page.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Surface for MemorySurface {
    fn mount(&self, markup: &str) {
        let mut page = self.lock();
        page.markup = markup.to_string();
        page.mounts += 1;
    }

    fn markup(&self) -> String {
        self.lock().markup.clone()
    }

    fn set_title(&self, title: &str) {
        self.lock().title = title.to_string();
    }

    fn title(&self) -> String {
        self.lock().title.clone()
    }

    fn set_description(&self, description: &str) {
        self.lock().description = description.to_string();
    }

    fn set_active_nav(&self, path: &str) {
        self.lock().active_nav = Some(path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_replaces_content() {
        let surface = MemorySurface::new();
        surface.mount("<p>one</p>");
        surface.mount("<p>two</p>");
        assert_eq!(surface.markup(), "<p>two</p>");
        assert_eq!(surface.mount_count(), 2);
    }

    #[test]
    fn records_title_description_and_nav() {
        let surface = MemorySurface::new();
        surface.set_title("Dashboard | ARGO");
        surface.set_description("Float status");
        surface.set_active_nav("/dashboard");

        assert_eq!(surface.title(), "Dashboard | ARGO");
        assert_eq!(surface.description(), "Float status");
        assert_eq!(surface.active_nav().as_deref(), Some("/dashboard"));
    }
}
