// The keyword/symbol half of the chunk store: an embedded tantivy index over
// chunk metadata. Grounded on the teacher's `indexes::schema::File` (schema
// shape) and `indexes::indexer::Indexer::fuzzy_path_match` (trigram +
// bounded edit-distance regex fuzzy matching), generalized from file paths
// to function/class names and scoped per chunk hash rather than per repo
// pool.

use std::collections::HashSet;
use std::path::Path;

use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, FuzzyTermQuery, Query as TantivyQuery, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, SchemaBuilder, STORED, STRING, TEXT};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Term};
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::model::{Chunk, ChunkHash, FileHash, SymbolKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordMode {
    Exact,
    Fuzzy,
    Bm25,
}

struct Fields {
    chunk_hash: Field,
    repo_path: Field,
    file_path: Field,
    file_hash: Field,
    function_names: Field,
    class_names: Field,
    imports: Field,
    content: Field,
    language: Field,
    start_line: Field,
    end_line: Field,
}

fn build_schema() -> (Schema, Fields) {
    use tantivy::schema::FAST;

    let mut builder = SchemaBuilder::new();
    let chunk_hash = builder.add_text_field("chunk_hash", STRING | STORED);
    let repo_path = builder.add_text_field("repo_path", STRING | STORED);
    let file_path = builder.add_text_field("file_path", STRING | STORED);
    let file_hash = builder.add_text_field("file_hash", STRING | STORED);
    let function_names = builder.add_text_field("function_names", TEXT | STORED);
    let class_names = builder.add_text_field("class_names", TEXT | STORED);
    let imports = builder.add_text_field("imports", TEXT | STORED);
    let content = builder.add_text_field("content", STORED);
    let language = builder.add_text_field("language", STRING | STORED);
    let start_line = builder.add_u64_field("start_line", STORED | FAST);
    let end_line = builder.add_u64_field("end_line", STORED | FAST);
    let schema = builder.build();
    (
        schema,
        Fields {
            chunk_hash,
            repo_path,
            file_path,
            file_hash,
            function_names,
            class_names,
            imports,
            content,
            language,
            start_line,
            end_line,
        },
    )
}

pub struct KeywordIndex {
    index: Index,
    reader: RwLock<IndexReader>,
    writer: tokio::sync::Mutex<IndexWriter>,
    fields: Fields,
}

impl KeywordIndex {
    /// Idempotent: opens the on-disk index at `dir` or creates it, matching
    /// the store's "ensure schema" contract for the keyword half.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| Error::Internal(e.into()))?;
        let (schema, fields) = build_schema();
        let index = if Index::exists(&tantivy::directory::MmapDirectory::open(dir).map_err(|e| Error::Internal(e.into()))?)
            .unwrap_or(false)
        {
            Index::open_in_dir(dir).map_err(|e| Error::Internal(e.into()))?
        } else {
            Index::create_in_dir(dir, schema).map_err(|e| Error::Internal(e.into()))?
        };
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e: tantivy::TantivyError| Error::Internal(e.into()))?;
        let writer = index
            .writer(50_000_000)
            .map_err(|e| Error::Internal(e.into()))?;
        Ok(Self {
            index,
            reader: RwLock::new(reader),
            writer: tokio::sync::Mutex::new(writer),
            fields,
        })
    }

    pub async fn upsert(&self, repo_path: &str, chunk: &Chunk) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.delete_term(Term::from_field_text(self.fields.chunk_hash, &chunk.chunk_hash.0));
        let mut doc = tantivy::Document::new();
        doc.add_text(self.fields.chunk_hash, &chunk.chunk_hash.0);
        doc.add_text(self.fields.repo_path, repo_path);
        doc.add_text(self.fields.file_path, &chunk.file_path);
        doc.add_text(self.fields.file_hash, &chunk.file_hash.0);
        for name in &chunk.metadata.function_names {
            doc.add_text(self.fields.function_names, name);
        }
        for name in &chunk.metadata.class_names {
            doc.add_text(self.fields.class_names, name);
        }
        for import in &chunk.metadata.imports {
            doc.add_text(self.fields.imports, import);
        }
        doc.add_text(self.fields.content, &chunk.content);
        if let Some(language) = &chunk.language {
            doc.add_text(self.fields.language, language);
        }
        doc.add_u64(self.fields.start_line, chunk.start_line as u64);
        doc.add_u64(self.fields.end_line, chunk.end_line as u64);
        writer.add_document(doc).map_err(|e| Error::Internal(e.into()))?;
        writer.commit().map_err(|e| Error::Internal(e.into()))?;
        self.reader.write().await.reload().map_err(|e| Error::Internal(e.into()))?;
        Ok(())
    }

    /// Removes every chunk under `repo_path` whose file hash is not in
    /// `live_file_hashes`, matching the store's "delete by predicate" contract
    /// used during a full sync's garbage collection.
    pub async fn delete_stale(&self, repo_path: &str, live_file_hashes: &HashSet<FileHash>) -> Result<usize> {
        let reader = self.reader.read().await;
        let searcher = reader.searcher();
        let repo_term = TermQuery::new(
            Term::from_field_text(self.fields.repo_path, repo_path),
            IndexRecordOption::Basic,
        );
        let docs = searcher
            .search(&repo_term, &TopDocs::with_limit(1_000_000))
            .map_err(|e| Error::Internal(e.into()))?;

        let mut writer = self.writer.lock().await;
        let mut removed = 0;
        for (_, addr) in docs {
            let doc = searcher.doc(addr).map_err(|e| Error::Internal(e.into()))?;
            let file_hash = doc
                .get_first(self.fields.file_hash)
                .and_then(|v| v.as_text())
                .map(|s| FileHash(s.to_owned()));
            let chunk_hash = doc.get_first(self.fields.chunk_hash).and_then(|v| v.as_text());
            if let (Some(hash), Some(chunk_hash)) = (file_hash, chunk_hash) {
                if !live_file_hashes.contains(&hash) {
                    writer.delete_term(Term::from_field_text(self.fields.chunk_hash, chunk_hash));
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            writer.commit().map_err(|e| Error::Internal(e.into()))?;
            self.reader.write().await.reload().map_err(|e| Error::Internal(e.into()))?;
        }
        Ok(removed)
    }

    /// Lexical search over `function_names`/`class_names`/`file_path`,
    /// restricted to one repo's manifest. `Exact` and `Fuzzy` build a
    /// trigram/edit-distance filter the way the teacher's
    /// `fuzzy_path_match` does for file paths; `Bm25` defers straight to
    /// tantivy's own scorer across the text fields.
    pub async fn search(
        &self,
        repo_path: &str,
        keyword: &str,
        mode: KeywordMode,
        limit: usize,
    ) -> Result<Vec<(ChunkHash, f32)>> {
        let reader = self.reader.read().await;
        let searcher = reader.searcher();
        let repo_term: Box<dyn TantivyQuery> = Box::new(TermQuery::new(
            Term::from_field_text(self.fields.repo_path, repo_path),
            IndexRecordOption::Basic,
        ));

        let text_query: Box<dyn TantivyQuery> = match mode {
            KeywordMode::Exact => Box::new(TermQuery::new(
                Term::from_field_text(self.fields.function_names, keyword),
                IndexRecordOption::Basic,
            )),
            KeywordMode::Fuzzy => Box::new(FuzzyTermQuery::new(
                Term::from_field_text(self.fields.function_names, keyword),
                2,
                true,
            )),
            KeywordMode::Bm25 => {
                let parser = QueryParser::for_index(
                    &self.index,
                    vec![self.fields.function_names, self.fields.class_names, self.fields.file_path],
                );
                parser
                    .parse_query(keyword)
                    .map_err(|e| Error::ClientError(e.to_string()))?
            }
        };

        let combined = BooleanQuery::intersection(vec![repo_term, text_query]);
        let hits = searcher
            .search(&combined, &TopDocs::with_limit(limit))
            .map_err(|e| Error::Internal(e.into()))?;

        let mut out = Vec::with_capacity(hits.len());
        for (score, addr) in hits {
            let doc = searcher.doc(addr).map_err(|e| Error::Internal(e.into()))?;
            if let Some(hash) = doc.get_first(self.fields.chunk_hash).and_then(|v| v.as_text()) {
                out.push((ChunkHash(hash.to_owned()), score));
            }
        }
        Ok(out)
    }

    /// Symbol autocomplete: returns (name, kind) pairs matching `keyword`,
    /// optionally restricted to one of the four documented kinds (`file`,
    /// `class`, `function`, `directory`), aggregated across chunks and
    /// sorted by the best chunk score. `File`/`Directory` have no dedicated
    /// tantivy field, so they're derived from `file_path` directly rather
    /// than through `field_for_kind`'s metadata fields.
    pub async fn symbol_search(
        &self,
        repo_path: &str,
        keyword: &str,
        kind: Option<SymbolKind>,
        limit: usize,
    ) -> Result<Vec<(String, SymbolKind, f32)>> {
        let kinds = kind.map(|k| vec![k]).unwrap_or_else(|| {
            vec![SymbolKind::Function, SymbolKind::Class, SymbolKind::File, SymbolKind::Directory]
        });

        let reader = self.reader.read().await;
        let searcher = reader.searcher();
        let repo_term = Term::from_field_text(self.fields.repo_path, repo_path);
        let needle = keyword.to_lowercase();
        let mut results: Vec<(String, SymbolKind, f32)> = Vec::new();

        for kind in kinds {
            match kind {
                SymbolKind::Function | SymbolKind::Class | SymbolKind::Import => {
                    let field = match kind {
                        SymbolKind::Function => self.fields.function_names,
                        SymbolKind::Class => self.fields.class_names,
                        SymbolKind::Import => self.fields.imports,
                        SymbolKind::File | SymbolKind::Directory => unreachable!(),
                    };
                    let fuzzy = FuzzyTermQuery::new(Term::from_field_text(field, keyword), 1, true);
                    let repo_query: Box<dyn TantivyQuery> =
                        Box::new(TermQuery::new(repo_term.clone(), IndexRecordOption::Basic));
                    let combined = BooleanQuery::intersection(vec![repo_query, Box::new(fuzzy)]);
                    let hits = searcher
                        .search(&combined, &TopDocs::with_limit(limit))
                        .map_err(|e| Error::Internal(e.into()))?;
                    for (score, addr) in hits {
                        let doc = searcher.doc(addr).map_err(|e| Error::Internal(e.into()))?;
                        let names: Vec<&str> = doc.get_all(field).filter_map(|v| v.as_text()).collect();
                        for name in names {
                            if name.to_lowercase().contains(&needle) {
                                results.push((name.to_owned(), kind, score));
                            }
                        }
                    }
                }
                SymbolKind::File | SymbolKind::Directory => {
                    let repo_query = TermQuery::new(repo_term.clone(), IndexRecordOption::Basic);
                    let hits = searcher
                        .search(&repo_query, &TopDocs::with_limit(10_000))
                        .map_err(|e| Error::Internal(e.into()))?;
                    let mut seen = HashSet::new();
                    for (score, addr) in hits {
                        let doc = searcher.doc(addr).map_err(|e| Error::Internal(e.into()))?;
                        let Some(path) = doc.get_first(self.fields.file_path).and_then(|v| v.as_text()) else { continue };
                        let candidates: Vec<String> = if kind == SymbolKind::File {
                            Path::new(path)
                                .file_name()
                                .map(|n| n.to_string_lossy().into_owned())
                                .into_iter()
                                .collect()
                        } else {
                            Path::new(path)
                                .ancestors()
                                .skip(1)
                                .filter(|p| !p.as_os_str().is_empty())
                                .map(|p| p.to_string_lossy().into_owned())
                                .collect()
                        };
                        for name in candidates {
                            if name.to_lowercase().contains(&needle) && seen.insert(name.clone()) {
                                results.push((name, kind, score));
                            }
                        }
                    }
                }
            }
        }

        results.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        results.dedup_by(|a, b| a.0 == b.0 && a.1 == b.1);
        results.truncate(limit);
        Ok(results)
    }

    /// Resolves a set of chunk hashes back to full `Chunk`s, the way the
    /// retrieval engine's shaping phase needs after collecting candidates
    /// from the vector store (which only carries hashes, not text).
    pub async fn resolve(&self, hashes: &[ChunkHash]) -> Result<Vec<Chunk>> {
        let reader = self.reader.read().await;
        let searcher = reader.searcher();
        let mut out = Vec::with_capacity(hashes.len());
        for hash in hashes {
            let term = Term::from_field_text(self.fields.chunk_hash, &hash.0);
            let query = TermQuery::new(term, IndexRecordOption::Basic);
            let hits = searcher
                .search(&query, &TopDocs::with_limit(1))
                .map_err(|e| Error::Internal(e.into()))?;
            if let Some((_, addr)) = hits.first() {
                let doc = searcher.doc(*addr).map_err(|e| Error::Internal(e.into()))?;
                out.push(self.doc_to_chunk(&doc));
            }
        }
        Ok(out)
    }

    /// All chunks for one file in a repo, sorted by line, used by focus-file
    /// expansion.
    pub async fn chunks_for_file(&self, repo_path: &str, file_path: &str) -> Result<Vec<Chunk>> {
        let reader = self.reader.read().await;
        let searcher = reader.searcher();
        let repo_query: Box<dyn TantivyQuery> = Box::new(TermQuery::new(
            Term::from_field_text(self.fields.repo_path, repo_path),
            IndexRecordOption::Basic,
        ));
        let file_query: Box<dyn TantivyQuery> = Box::new(TermQuery::new(
            Term::from_field_text(self.fields.file_path, file_path),
            IndexRecordOption::Basic,
        ));
        let combined = BooleanQuery::intersection(vec![repo_query, file_query]);
        let hits = searcher
            .search(&combined, &TopDocs::with_limit(10_000))
            .map_err(|e| Error::Internal(e.into()))?;

        let mut chunks: Vec<Chunk> = Vec::with_capacity(hits.len());
        for (_, addr) in hits {
            let doc = searcher.doc(addr).map_err(|e| Error::Internal(e.into()))?;
            chunks.push(self.doc_to_chunk(&doc));
        }
        chunks.sort_by_key(|c| c.start_line);
        Ok(chunks)
    }

    /// A bounded sample of chunks under one directory, used by focus-directory
    /// expansion.
    pub async fn chunks_under_directory(
        &self,
        repo_path: &str,
        directory: &str,
        limit: usize,
    ) -> Result<Vec<Chunk>> {
        let reader = self.reader.read().await;
        let searcher = reader.searcher();
        let repo_term = TermQuery::new(
            Term::from_field_text(self.fields.repo_path, repo_path),
            IndexRecordOption::Basic,
        );
        let hits = searcher
            .search(&repo_term, &TopDocs::with_limit(10_000))
            .map_err(|e| Error::Internal(e.into()))?;

        let prefix = if directory.is_empty() { String::new() } else { format!("{directory}/") };
        let mut chunks = Vec::new();
        for (_, addr) in hits {
            if chunks.len() >= limit {
                break;
            }
            let doc = searcher.doc(addr).map_err(|e| Error::Internal(e.into()))?;
            let chunk = self.doc_to_chunk(&doc);
            if chunk.file_path.starts_with(&prefix) {
                chunks.push(chunk);
            }
        }
        Ok(chunks)
    }

    fn doc_to_chunk(&self, doc: &tantivy::Document) -> Chunk {
        let text = |field: Field| -> String {
            doc.get_first(field).and_then(|v| v.as_text()).unwrap_or_default().to_owned()
        };
        let texts = |field: Field| -> Vec<String> {
            doc.get_all(field).filter_map(|v| v.as_text()).map(str::to_owned).collect()
        };
        let number = |field: Field| -> usize {
            doc.get_first(field).and_then(|v| v.as_u64()).unwrap_or(0) as usize
        };

        Chunk {
            chunk_hash: ChunkHash(text(self.fields.chunk_hash)),
            file_path: text(self.fields.file_path),
            file_hash: FileHash(text(self.fields.file_hash)),
            start_line: number(self.fields.start_line),
            end_line: number(self.fields.end_line),
            content: text(self.fields.content),
            language: doc.get_first(self.fields.language).and_then(|v| v.as_text()).map(str::to_owned),
            metadata: crate::model::ChunkMetadata {
                function_names: texts(self.fields.function_names),
                class_names: texts(self.fields.class_names),
                imports: texts(self.fields.imports),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChunkMetadata, FileHash};

    fn sample_chunk(name: &str) -> Chunk {
        Chunk {
            chunk_hash: ChunkHash(format!("hash-{name}")),
            file_path: format!("{name}.rs"),
            file_hash: FileHash("filehash".to_owned()),
            start_line: 1,
            end_line: 3,
            content: "fn x() {}".to_owned(),
            language: Some("rust".to_owned()),
            metadata: ChunkMetadata {
                function_names: vec![name.to_owned()],
                class_names: vec![],
                imports: vec![],
            },
        }
    }

    #[tokio::test]
    async fn upserts_and_finds_by_exact_function_name() {
        let dir = tempfile::tempdir().unwrap();
        let index = KeywordIndex::open(dir.path()).unwrap();
        index.upsert("/repo", &sample_chunk("login_handler")).await.unwrap();

        let hits = index
            .search("/repo", "login_handler", KeywordMode::Exact, 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, ChunkHash("hash-login_handler".to_owned()));
    }

    #[tokio::test]
    async fn delete_stale_removes_chunks_whose_file_hash_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let index = KeywordIndex::open(dir.path()).unwrap();
        index.upsert("/repo", &sample_chunk("stale")).await.unwrap();

        let removed = index.delete_stale("/repo", &HashSet::new()).await.unwrap();
        assert_eq!(removed, 1);

        let hits = index.search("/repo", "stale", KeywordMode::Exact, 10).await.unwrap();
        assert!(hits.is_empty());
    }
}
