// Link propagation: pure decision logic plus the browser DOM adapter
pub mod dom;
pub mod propagator;

#[cfg(test)]
pub(crate) mod fake_dom;

pub use dom::WebDocument;
pub use propagator::{
    Anchor, LinkDecision, LinkDocument, LinkPropagator, LinkSkip, PageContext, SweepReport,
};
