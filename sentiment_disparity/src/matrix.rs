use crate::config::{SentimentItem, TraitDef};

/// The trait value of a respondent, once validated.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum TraitValue {
    /// The respondent did not answer, or the answer could not be attributed.
    Unknown,
    /// Index into the categories of the trait definition.
    Category(usize),
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Respondent {
    pub id: String,
    /// One value per trait, in the order of the trait definitions.
    pub traits: Vec<TraitValue>,
}

/// The validated survey responses.
///
/// Invariants, enforced by the builder:
/// - every present response lies within the scale of its item
/// - every respondent carries one value (possibly unknown) for every trait
///
/// The matrix is never modified after construction, and may be shared freely
/// between threads.
#[derive(PartialEq, Debug, Clone)]
pub struct ResponseMatrix {
    pub(crate) items: Vec<SentimentItem>,
    pub(crate) traits: Vec<TraitDef>,
    pub(crate) respondents: Vec<Respondent>,
    // Column-major: one vector per item, one cell per respondent.
    pub(crate) responses: Vec<Vec<Option<f64>>>,
}

impl ResponseMatrix {
    pub fn items(&self) -> &[SentimentItem] {
        &self.items
    }

    pub fn traits(&self) -> &[TraitDef] {
        &self.traits
    }

    pub fn respondents(&self) -> &[Respondent] {
        &self.respondents
    }

    pub fn num_respondents(&self) -> usize {
        self.respondents.len()
    }

    /// The responses to one item, in respondent order. `None` is a missing answer.
    pub fn responses(&self, item_idx: usize) -> &[Option<f64>] {
        &self.responses[item_idx]
    }

    /// The values of one trait, in respondent order.
    pub fn trait_values(&self, trait_idx: usize) -> impl Iterator<Item = TraitValue> + '_ {
        self.respondents.iter().map(move |r| r.traits[trait_idx])
    }

    pub fn item_index(&self, item_id: &str) -> Option<usize> {
        self.items.iter().position(|i| i.id == item_id)
    }

    pub fn trait_index(&self, trait_id: &str) -> Option<usize> {
        self.traits.iter().position(|t| t.id == trait_id)
    }

    /// The valid (non-missing) responses to one item.
    pub fn valid_responses(&self, item_idx: usize) -> Vec<f64> {
        self.responses[item_idx].iter().flatten().cloned().collect()
    }
}
