use crate::{FolioError, Identifier, MetadataStore, ReferenceResolver, Resource, Result};
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Clone)]
pub struct ListInverseOperation {
    metadata: Arc<dyn MetadataStore>,
}

#[derive(Debug, Clone)]
pub struct ListInverseOperationRequest {
    pub target_id: Identifier,
    /// Attribute on the referrers that names the target.
    pub attribute: String,
    pub kind: String,
    /// Integer attribute to order by. Referrers without it sort last.
    pub order_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ListInverseOperationResult {
    pub target: Resource,
    pub items: Vec<Resource>,
}

impl ListInverseOperation {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    pub async fn run(
        &self,
        request: ListInverseOperationRequest,
    ) -> Result<ListInverseOperationResult> {
        let ListInverseOperationRequest {
            target_id,
            attribute,
            kind,
            order_by,
        } = request;

        let target = self
            .metadata
            .find_by(&target_id)?
            .ok_or_else(|| FolioError::ResourceNotFound(target_id.clone()))?;

        let resolver = ReferenceResolver::new(self.metadata.as_ref());
        let mut items = resolver.inverse_of_kind(&target, &attribute, &kind)?;

        if let Some(order_by) = order_by {
            items.sort_by(|a, b| compare_by(a, b, &order_by));
        }

        Ok(ListInverseOperationResult { target, items })
    }
}

fn compare_by(a: &Resource, b: &Resource, attribute: &str) -> Ordering {
    let key = |r: &Resource| r.first(attribute).and_then(|v| v.as_integer());
    match (key(a), key(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.id().cmp(&b.id()))
}
