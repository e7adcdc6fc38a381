mod futures;
mod group;
mod stack;

#[cfg_attr(not(loom), allow(unused_imports))]
pub(super) use self::{futures::*, group::*, limiter::*, stack::*};
