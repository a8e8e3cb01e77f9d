//! Stock comparators for ordering eligible members.

use std::cmp::Ordering;

use crate::schema::{Marker, Member};

/// An eligible member together with the marker that made it eligible.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'s> {
    pub member: &'s Member,
    pub marker: &'s Marker,
}

impl Candidate<'_> {
    pub fn name(&self) -> &str {
        self.member.name()
    }
}

pub fn by_name(a: &Candidate, b: &Candidate) -> Ordering {
    a.name().cmp(b.name())
}

/// Registration order of the schema.
pub fn by_declaration(a: &Candidate, b: &Candidate) -> Ordering {
    a.member.index().cmp(&b.member.index())
}

/// Explicit marker `order` ascending; unordered members go last, in
/// declaration order.
pub fn by_marker_order(a: &Candidate, b: &Candidate) -> Ordering {
    match (a.marker.order, b.marker.order) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| by_declaration(a, b))
}
