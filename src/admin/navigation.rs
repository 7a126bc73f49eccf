//! Admin tabs and the rules for moving between them.

use crate::models::Blog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Dashboard,
    Blogs,
    Create,
    Edit,
    /// Placeholder, nothing to configure yet
    Settings,
}

impl Tab {
    /// Label used in logs and JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Dashboard => "dashboard",
            Tab::Blogs => "blogs",
            Tab::Create => "create",
            Tab::Edit => "edit",
            Tab::Settings => "settings",
        }
    }
}

/// What the console renders for the active tab.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum View<'a> {
    Dashboard,
    Blogs,
    Create,
    Edit(&'a Blog),
    Settings,
}

#[derive(Debug, Clone, Default)]
pub struct Navigator {
    active: Tab,
    editing: Option<Blog>,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Tab {
        self.active
    }

    /// Switch tabs. Leaving for anything but `Edit` drops the edit target.
    pub fn select(&mut self, tab: Tab) {
        self.active = tab;
        if tab != Tab::Edit {
            self.editing = None;
        }
    }

    pub fn begin_edit(&mut self, blog: Blog) {
        self.editing = Some(blog);
        self.active = Tab::Edit;
    }

    /// Back to the dashboard with no edit target, as after logout.
    pub fn reset(&mut self) {
        self.select(Tab::Dashboard);
    }

    /// The view for the active tab. `Edit` without a target shows the list.
    pub fn current_view(&self) -> View<'_> {
        match self.active {
            Tab::Dashboard => View::Dashboard,
            Tab::Blogs => View::Blogs,
            Tab::Create => View::Create,
            Tab::Edit => match &self.editing {
                Some(blog) => View::Edit(blog),
                None => View::Blogs,
            },
            Tab::Settings => View::Settings,
        }
    }
}
