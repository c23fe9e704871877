use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::entity::ViewEntity;

/// Ordering of the view list
pub type Comparator = Box<dyn Fn(&ViewEntity, &ViewEntity) -> Ordering>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortMethod {
    /// Active transfers first, then by name
    #[default]
    Status,
    NameAsc,
    NameDesc,
}

impl SortMethod {
    pub fn comparator(self) -> Comparator {
        match self {
            SortMethod::Status => Box::new(by_status),
            SortMethod::NameAsc => Box::new(by_name_ascending),
            SortMethod::NameDesc => Box::new(by_name_descending),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortMethod::Status => "status",
            SortMethod::NameAsc => "name-asc",
            SortMethod::NameDesc => "name-desc",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "status" => Some(SortMethod::Status),
            "name-asc" | "name" => Some(SortMethod::NameAsc),
            "name-desc" => Some(SortMethod::NameDesc),
            _ => None,
        }
    }
}

pub fn by_status(a: &ViewEntity, b: &ViewEntity) -> Ordering {
    a.status
        .priority()
        .cmp(&b.status.priority())
        .then_with(|| a.name.cmp(&b.name))
}

pub fn by_name_ascending(a: &ViewEntity, b: &ViewEntity) -> Ordering {
    a.name.cmp(&b.name)
}

pub fn by_name_descending(a: &ViewEntity, b: &ViewEntity) -> Ordering {
    b.name.cmp(&a.name)
}
