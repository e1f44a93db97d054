use crate::schema::{BOOK, PAGE};
use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use folio_core::operations::{
    AttachFileOperation, AttachFileOperationRequest, CreateResourceOperation,
    CreateResourceOperationRequest, DeleteResourceOperation, DeleteResourceOperationOutcome,
    DeleteResourceOperationRequest, ListInverseOperation, ListInverseOperationRequest,
    ReadResourceOperation, ReadResourceOperationOutcome, ReadResourceOperationRequest,
    VerifyFileOperation, VerifyFileOperationOutcome, VerifyFileOperationRequest,
};
use folio_core::{
    DigestAlgorithm, Digests, FileExpectation, FolioError, Identifier, IdentifierMinter, Resource,
    Stores, StoredFile, Value,
};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct BookView {
    pub book: Resource,
    pub pages: Vec<Resource>,
    pub files: Vec<StoredFile>,
}

#[derive(Debug, Serialize)]
pub struct PageView {
    pub page: Resource,
    pub file: Option<StoredFile>,
}

#[derive(Debug, Serialize)]
pub struct VerifyView {
    pub file_id: Identifier,
    pub valid: bool,
    pub found: bool,
    pub size: Option<u64>,
    pub digests: Option<Digests>,
}

/// Command handlers behind the `folio` subcommands, one method per command.
pub struct App {
    stores: Stores,
    minter: IdentifierMinter,
}

impl App {
    pub fn new(stores: Stores) -> Self {
        Self {
            stores,
            minter: IdentifierMinter::new(),
        }
    }

    pub async fn book_create(
        &self,
        title: String,
        authors: Vec<String>,
        published_on: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Resource> {
        let mut attributes = vec![("title".to_string(), vec![Value::from(title)])];
        if !authors.is_empty() {
            attributes.push((
                "author".to_string(),
                authors.into_iter().map(Value::from).collect(),
            ));
        }
        if let Some(date) = published_on {
            attributes.push(("published_on".to_string(), vec![Value::from(date)]));
        }

        let result = CreateResourceOperation::new(
            self.stores.metadata.clone(),
            self.stores.schemas.clone(),
        )
        .run(CreateResourceOperationRequest {
            kind: BOOK.to_string(),
            attributes,
        })
        .await?;
        Ok(result.resource)
    }

    pub fn book_list(&self) -> anyhow::Result<Vec<Resource>> {
        let books = self.stores.metadata.find_all_of_kind(BOOK)?;
        Ok(books.collect())
    }

    pub async fn book_show(&self, id: Identifier) -> anyhow::Result<Option<BookView>> {
        let outcome = ReadResourceOperation::new(
            self.stores.metadata.clone(),
            self.stores.content.clone(),
        )
        .run(ReadResourceOperationRequest {
            id,
            include_files: true,
        })
        .await?;

        let ReadResourceOperationOutcome::Found(found) = outcome else {
            return Ok(None);
        };
        if found.resource.kind() != BOOK {
            bail!(
                "{} is a {}, not a {}",
                found.resource.persisted_id()?,
                found.resource.kind(),
                BOOK
            );
        }

        let pages = self
            .stores
            .metadata
            .find_members(&found.resource, "member_ids")?;
        Ok(Some(BookView {
            book: found.resource,
            pages,
            files: found.files,
        }))
    }

    /// Create a page for `book_id` and append it to the book's member list in
    /// a single write, then optionally attach a scan read from `file`.
    pub async fn page_add(
        &self,
        book_id: Identifier,
        number: i64,
        file: Option<&Path>,
    ) -> anyhow::Result<PageView> {
        let page_id = self.minter.mint()?;
        let mut draft = Resource::with_id(PAGE, page_id.clone());
        draft.set("page_number", [number]);
        draft.set("book_id", [book_id.clone()]);

        let saved = self
            .stores
            .metadata
            .update_with(&book_id, &mut |book| {
                if book.kind() != BOOK {
                    return Err(FolioError::InvalidRequest(format!(
                        "{} is a {}, not a {}",
                        book_id,
                        book.kind(),
                        BOOK
                    )));
                }
                book.push("member_ids", page_id.clone());
                Ok(vec![draft.clone()])
            })?
            .with_context(|| format!("book {} not found", book_id))?;
        let page = saved
            .into_iter()
            .nth(1)
            .with_context(|| format!("page {} was not saved", page_id))?;

        let Some(path) = file else {
            return Ok(PageView { page, file: None });
        };

        let body = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        let original_filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let attached = AttachFileOperation::new(
            self.stores.metadata.clone(),
            self.stores.content.clone(),
        )
        .run(AttachFileOperationRequest {
            resource_id: page_id,
            attribute: "file_ids".to_string(),
            original_filename,
            body: Box::new(body),
        })
        .await?;

        Ok(PageView {
            page: attached.resource,
            file: Some(attached.file),
        })
    }

    pub async fn page_list(&self, book_id: Identifier) -> anyhow::Result<Vec<Resource>> {
        let result = ListInverseOperation::new(self.stores.metadata.clone())
            .run(ListInverseOperationRequest {
                target_id: book_id,
                attribute: "book_id".to_string(),
                kind: PAGE.to_string(),
                order_by: Some("page_number".to_string()),
            })
            .await?;
        Ok(result.items)
    }

    pub async fn file_verify(
        &self,
        file_id: Identifier,
        expectation: FileExpectation,
    ) -> anyhow::Result<VerifyView> {
        if expectation.size.is_none() && expectation.digests.is_empty() {
            bail!("nothing to verify: pass --size or at least one digest");
        }

        let outcome = VerifyFileOperation::new(self.stores.content.clone())
            .run(VerifyFileOperationRequest {
                file_id: file_id.clone(),
                expectation,
            })
            .await?;

        let valid = outcome.is_valid();
        let view = match outcome {
            VerifyFileOperationOutcome::Valid(result)
            | VerifyFileOperationOutcome::Invalid(result) => VerifyView {
                file_id,
                valid,
                found: true,
                size: Some(result.actual_size),
                digests: Some(result.actual_digests),
            },
            VerifyFileOperationOutcome::NotFound => VerifyView {
                file_id,
                valid: false,
                found: false,
                size: None,
                digests: None,
            },
        };
        Ok(view)
    }

    pub async fn file_checksum(
        &self,
        file_id: &Identifier,
        algorithms: &[DigestAlgorithm],
    ) -> anyhow::Result<Option<Digests>> {
        let requested = if algorithms.is_empty() {
            DigestAlgorithm::ALL.to_vec()
        } else {
            algorithms.to_vec()
        };
        Ok(self.stores.content.checksum(file_id, &requested).await?)
    }

    pub async fn delete(
        &self,
        id: Identifier,
        with_files: bool,
    ) -> anyhow::Result<DeleteResourceOperationOutcome> {
        let outcome = DeleteResourceOperation::new(
            self.stores.metadata.clone(),
            self.stores.content.clone(),
        )
        .run(DeleteResourceOperationRequest {
            id,
            delete_files: with_files,
        })
        .await?;
        Ok(outcome)
    }
}
