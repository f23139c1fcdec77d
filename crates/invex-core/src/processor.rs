//! Document processing pipeline: decode, reconstruct, match, extract.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::error::{panic_message, InvexError, Result, StrategyError};
use crate::layout::LineReconstructor;
use crate::models::config::ExtractionConfig;
use crate::models::{ExtractionResult, FieldDefinition, Glyph, Page, Template};
use crate::pdf::GlyphDecoder;
use crate::strategy::{ExtractionContext, FieldExtractor, StrategyRegistry};
use crate::template::{TemplateSet, TemplateStore};

/// Runs documents through the extraction pipeline.
///
/// Shares nothing mutable between calls, so one processor can serve many
/// threads at once.
pub struct DocumentProcessor {
    store: Arc<dyn TemplateStore>,
    registry: Arc<StrategyRegistry>,
    decoder: Box<dyn GlyphDecoder>,
    config: ExtractionConfig,
    reconstructor: LineReconstructor,
    prepared: RwLock<Option<Arc<PreparedSet>>>,
}

/// The templates of one store snapshot with every field resolved against
/// the registry. `fields[t][f]` is `None` when field `f` of template `t`
/// does not resolve.
struct PreparedSet {
    snapshot: Arc<TemplateSet>,
    fields: Vec<Vec<Option<Arc<dyn FieldExtractor>>>>,
}

impl DocumentProcessor {
    pub fn new(
        store: Arc<dyn TemplateStore>,
        registry: Arc<StrategyRegistry>,
        decoder: Box<dyn GlyphDecoder>,
    ) -> Self {
        Self {
            store,
            registry,
            decoder,
            config: ExtractionConfig::default(),
            reconstructor: LineReconstructor::new(),
            prepared: RwLock::new(None),
        }
    }

    /// Build the standard pipeline from configuration: file-system
    /// templates, the built-in strategies and the PDF decoder.
    ///
    /// Fails with [`InvexError::Config`] when any stored template names an
    /// unknown strategy or carries invalid options.
    #[cfg(feature = "native")]
    pub fn from_config(config: &crate::models::config::InvexConfig) -> Result<Self> {
        let store = crate::template::FileSystemTemplateStore::with_options(
            config.templates.path.clone(),
            config.templates.read_only,
        )?;
        let decoder = crate::pdf::PdfGlyphDecoder::from_config(&config.pdf);
        let processor = Self::new(
            Arc::new(store),
            Arc::new(StrategyRegistry::with_defaults()),
            Box::new(decoder),
        )
        .with_config(config.extraction.clone())
        .with_reconstructor(config.layout.reconstructor());
        processor.check_templates()?;
        Ok(processor)
    }

    /// Prepare the current templates, failing on the first misconfigured
    /// ones.
    pub fn check_templates(&self) -> Result<()> {
        let problems = self.validate_templates();
        if !problems.is_empty() {
            let details: Vec<String> = problems
                .iter()
                .map(|(template, err)| format!("template '{template}': {err}"))
                .collect();
            return Err(InvexError::Config(details.join("; ")));
        }
        self.prepared();
        Ok(())
    }

    pub fn with_config(mut self, config: ExtractionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_reconstructor(mut self, reconstructor: LineReconstructor) -> Self {
        self.reconstructor = reconstructor;
        self
    }

    pub fn store(&self) -> &Arc<dyn TemplateStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<StrategyRegistry> {
        &self.registry
    }

    pub fn reconstructor(&self) -> &LineReconstructor {
        &self.reconstructor
    }

    /// Extract the fields of one uploaded document.
    pub fn process(&self, file_name: &str, bytes: &[u8]) -> Result<ExtractionResult> {
        self.check_request(file_name, bytes)?;
        let page = self.decode(bytes)?;
        self.process_page(file_name, &page)
    }

    /// Decode the first page of a document.
    pub fn decode(&self, bytes: &[u8]) -> Result<Page> {
        let page = self.decoder.decode(bytes).map_err(|e| {
            error!("Failed to decode document: {}", e);
            InvexError::PdfParse(e)
        })?;
        Ok(page)
    }

    /// Reconstructed text of a decoded page.
    pub fn page_text(&self, page: &Page) -> String {
        self.reconstructor.text(&page.glyphs)
    }

    /// Extract the fields of an already decoded page.
    pub fn process_page(&self, file_name: &str, page: &Page) -> Result<ExtractionResult> {
        let start = Instant::now();
        let text = self.page_text(page);
        debug!("Reconstructed {} characters of text for {}", text.len(), file_name);

        let prepared = self.prepared();
        let templates = prepared.snapshot.as_slice();
        let index = templates.iter().position(|t| t.matches(&text)).ok_or_else(|| {
            warn!("No template matched {}", file_name);
            InvexError::TemplateNotMatched {
                file_name: file_name.to_string(),
            }
        })?;
        let template = &templates[index];
        info!("Document {} matched template '{}'", file_name, template.template_name);

        let ordered;
        let glyphs: &[Glyph] = if self.config.reading_order_glyphs {
            ordered = self.reconstructor.reading_order(&page.glyphs);
            &ordered
        } else {
            &page.glyphs
        };

        let doc = PageView {
            text: &text,
            glyphs,
            width: page.width,
            height: page.height,
        };
        let fields = self.extract_fields(template, &prepared.fields[index], &doc)?;

        info!(
            "Extracted {}/{} fields from {} in {} ms",
            fields.len(),
            template.fields.len(),
            file_name,
            start.elapsed().as_millis()
        );

        let mut result = ExtractionResult::new(file_name, template.template_name.clone());
        result.fields = fields;
        Ok(result)
    }

    /// Configuration problems of every stored template.
    pub fn validate_templates(&self) -> Vec<(String, InvexError)> {
        let snapshot = self.store.snapshot();
        let mut problems = Vec::new();
        for template in snapshot.iter() {
            for err in self.registry.validate_template(template) {
                warn!("Template '{}': {}", template.template_name, err);
                problems.push((template.template_name.clone(), err));
            }
        }
        problems
    }

    fn check_request(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        if file_name.trim().is_empty() {
            return Err(InvexError::InvalidRequest("file name is empty".to_string()));
        }
        if bytes.is_empty() {
            return Err(InvexError::InvalidRequest(format!("{file_name} is empty")));
        }
        if self.config.require_pdf_extension && !file_name.to_ascii_lowercase().ends_with(".pdf") {
            return Err(InvexError::InvalidRequest(format!(
                "{file_name} is not a PDF file"
            )));
        }
        Ok(())
    }

    /// Prepared fields for the store's current snapshot, rebuilt whenever
    /// the store publishes a new one.
    fn prepared(&self) -> Arc<PreparedSet> {
        let snapshot = self.store.snapshot();
        if let Some(current) = self.prepared.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            if Arc::ptr_eq(&current.snapshot, &snapshot) {
                return current.clone();
            }
        }

        let fields = snapshot
            .iter()
            .map(|template| {
                template
                    .fields
                    .iter()
                    .map(|field| self.registry.resolve(field).ok())
                    .collect()
            })
            .collect();
        debug!("Prepared fields of {} templates", snapshot.len());

        let prepared = Arc::new(PreparedSet { snapshot, fields });
        *self.prepared.write().unwrap_or_else(PoisonError::into_inner) = Some(prepared.clone());
        prepared
    }

    fn extract_fields(
        &self,
        template: &Template,
        extractors: &[Option<Arc<dyn FieldExtractor>>],
        doc: &PageView<'_>,
    ) -> Result<BTreeMap<String, String>> {
        let outcomes = self.run_fields(template, extractors, doc);

        let mut fields = BTreeMap::new();
        for (field, outcome) in template.fields.iter().zip(outcomes) {
            match outcome? {
                Some(value) if !value.trim().is_empty() => {
                    info!("Field {} = {}", field.field_name, value);
                    fields.insert(field.field_name.clone(), value);
                }
                _ => debug!("Field {} produced no value", field.field_name),
            }
        }
        Ok(fields)
    }

    /// Per-field outcomes in template order. Sequential runs stop at the
    /// first failure; the merge in `extract_fields` reports the same one.
    fn run_fields(
        &self,
        template: &Template,
        extractors: &[Option<Arc<dyn FieldExtractor>>],
        doc: &PageView<'_>,
    ) -> Vec<Result<Option<String>>> {
        #[cfg(feature = "parallel")]
        {
            if self.config.parallel_fields {
                return template
                    .fields
                    .par_iter()
                    .zip(extractors.par_iter())
                    .map(|(field, extractor)| self.extract_field(field, extractor.as_ref(), template, doc))
                    .collect();
            }
        }

        let mut outcomes = Vec::with_capacity(template.fields.len());
        for (field, extractor) in template.fields.iter().zip(extractors) {
            let outcome = self.extract_field(field, extractor.as_ref(), template, doc);
            let failed = outcome.is_err();
            outcomes.push(outcome);
            if failed {
                break;
            }
        }
        outcomes
    }

    fn extract_field(
        &self,
        field: &FieldDefinition,
        extractor: Option<&Arc<dyn FieldExtractor>>,
        template: &Template,
        doc: &PageView<'_>,
    ) -> Result<Option<String>> {
        let extractor = match extractor {
            Some(extractor) => extractor.clone(),
            // Resolution is deterministic; resolving again rebuilds the error.
            None => self.registry.resolve(field).inspect_err(|e| {
                error!("Template '{}': {}", template.template_name, e);
            })?,
        };

        let ctx = ExtractionContext::new(
            field,
            &template.fields,
            doc.text,
            doc.glyphs,
            doc.width,
            doc.height,
        );

        panic::catch_unwind(AssertUnwindSafe(|| extractor.extract(&ctx)))
            .unwrap_or_else(|payload| Err(StrategyError::Panicked(panic_message(payload))))
            .map_err(|source| {
                error!("Field {} failed with strategy {}: {}", field.field_name, field.strategy, source);
                InvexError::ExtractionFailed {
                    field: field.field_name.clone(),
                    source,
                }
            })
    }
}

impl std::fmt::Debug for DocumentProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentProcessor")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("reconstructor", &self.reconstructor)
            .finish_non_exhaustive()
    }
}

/// The parts of a page every field of one document reads.
struct PageView<'a> {
    text: &'a str,
    glyphs: &'a [Glyph],
    width: f32,
    height: f32,
}
