use super::entity::{ViewEntity, ViewStatus};

/// Predicate deciding which entities appear in the filtered list
pub trait ViewFilter {
    fn meets_criteria(&self, entity: &ViewEntity) -> bool;
}

impl<F> ViewFilter for F
where
    F: Fn(&ViewEntity) -> bool,
{
    fn meets_criteria(&self, entity: &ViewEntity) -> bool {
        self(entity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFilter(pub ViewStatus);

impl ViewFilter for StatusFilter {
    fn meets_criteria(&self, entity: &ViewEntity) -> bool {
        entity.status == self.0
    }
}

/// Case-insensitive substring match on the name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameFilter {
    needle: String,
}

impl NameFilter {
    pub fn new(needle: &str) -> Self {
        Self {
            needle: needle.to_lowercase(),
        }
    }
}

impl ViewFilter for NameFilter {
    fn meets_criteria(&self, entity: &ViewEntity) -> bool {
        entity.name.to_lowercase().contains(&self.needle)
    }
}

/// Passes only entities every inner filter passes
#[derive(Default)]
pub struct AllOf {
    filters: Vec<Box<dyn ViewFilter>>,
}

impl AllOf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: impl ViewFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl ViewFilter for AllOf {
    fn meets_criteria(&self, entity: &ViewEntity) -> bool {
        self.filters.iter().all(|f| f.meets_criteria(entity))
    }
}
