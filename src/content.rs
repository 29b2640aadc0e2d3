use std::fs;
use std::path::PathBuf;

use crate::error::Result;
use crate::models::{normalize_topic_name, ChapterBundle, NoteChunk, Question, TopicContent};

/// A keyed source of chapter bundles.
pub trait ContentStore {
    fn fetch(&self, key: &str) -> Result<Option<ChapterBundle>>;
}

impl<T: ContentStore + ?Sized> ContentStore for &T {
    fn fetch(&self, key: &str) -> Result<Option<ChapterBundle>> {
        (**self).fetch(key)
    }
}

/// Bundles laid out as `<root>/<key>.json`. A store without a root never
/// finds anything.
#[derive(Debug, Clone, Default)]
pub struct DirectoryStore {
    root: Option<PathBuf>,
}

impl DirectoryStore {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }
}

impl ContentStore for DirectoryStore {
    fn fetch(&self, key: &str) -> Result<Option<ChapterBundle>> {
        let Some(root) = &self.root else {
            return Ok(None);
        };
        if !is_plain_key(key) {
            log::warn!("refusing content key outside the content directory: {:?}", key);
            return Ok(None);
        }
        let path = root.join(format!("{}.json", key));
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }
}

// A key must name a single file directly under the root.
fn is_plain_key(key: &str) -> bool {
    !key.is_empty()
        && !key.contains(['/', '\\', ':', '\0'])
        && !key.contains("..")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRequest {
    pub topic_owner_id: String,
    pub topic_name: String,
    pub display_title: String,
    pub subject_name: String,
    pub board: String,
    pub level: String,
    pub stream: Option<String>,
}

impl ContentRequest {
    /// `content_<board>_<level>[-<stream>]_<subject>_<owner>`
    pub fn precise_key(&self) -> String {
        let level = match self.stream.as_deref().map(str::trim) {
            Some(stream) if !stream.is_empty() => format!("{}-{}", self.level, stream),
            _ => self.level.clone(),
        };
        format!(
            "content_{}_{}_{}_{}",
            self.board, level, self.subject_name, self.topic_owner_id
        )
    }

    pub fn owner_key(&self) -> String {
        self.topic_owner_id.clone()
    }

    fn is_chapter_level(&self) -> bool {
        normalize_topic_name(&self.topic_name) == normalize_topic_name(&self.display_title)
    }
}

/// Supplies notes and questions for one topic. `None` and an empty question
/// bank mean the same thing to callers.
pub trait ContentResolver {
    fn resolve(&self, request: &ContentRequest) -> Option<TopicContent>;
}

/// Looks up the local cache by precise key, then the remote store by the
/// same key, then the remote store by chapter alone. Stops at the first
/// step that yields questions; a failing step counts as a miss.
pub struct TieredResolver<C, R> {
    cache: C,
    remote: R,
}

impl<C: ContentStore, R: ContentStore> TieredResolver<C, R> {
    pub fn new(cache: C, remote: R) -> Self {
        Self { cache, remote }
    }

    fn attempt(
        &self,
        store: &dyn ContentStore,
        tier: &str,
        key: &str,
        request: &ContentRequest,
    ) -> Option<TopicContent> {
        match store.fetch(key) {
            Ok(Some(bundle)) => {
                let content = select_topic(&bundle, request);
                if content.questions.is_empty() {
                    log::debug!("{} hit for {} has no questions for '{}'", tier, key, request.topic_name);
                    None
                } else {
                    log::debug!("{} hit for {}", tier, key);
                    Some(content)
                }
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("{} lookup for {} failed: {}", tier, key, e);
                None
            }
        }
    }
}

impl<C: ContentStore, R: ContentStore> ContentResolver for TieredResolver<C, R> {
    fn resolve(&self, request: &ContentRequest) -> Option<TopicContent> {
        let precise = request.precise_key();
        self.attempt(&self.cache, "cache", &precise, request)
            .or_else(|| self.attempt(&self.remote, "remote", &precise, request))
            .or_else(|| self.attempt(&self.remote, "remote", &request.owner_key(), request))
    }
}

/// Cut a chapter bundle down to one topic. Chapter-level topics get the
/// whole bank; sub-topics get the questions labelled with their name.
pub fn select_topic(bundle: &ChapterBundle, request: &ContentRequest) -> TopicContent {
    let wanted = normalize_topic_name(&request.topic_name);
    let whole_chapter = request.is_chapter_level();

    let questions: Vec<Question> = bundle
        .questions
        .iter()
        .filter(|q| q.is_answerable())
        .filter(|q| {
            whole_chapter
                || q.topic
                    .as_deref()
                    .map_or(false, |label| normalize_topic_name(label) == wanted)
        })
        .cloned()
        .collect();

    let mut notes: Vec<NoteChunk> = bundle
        .notes
        .iter()
        .filter(|n| whole_chapter || normalize_topic_name(&n.topic) == wanted)
        .cloned()
        .collect();

    if bundle.notes.is_empty() {
        if let Some(text) = bundle.content.as_deref().filter(|t| !t.trim().is_empty()) {
            notes.push(NoteChunk {
                topic: request.topic_name.clone(),
                content: text.to_string(),
            });
        }
    }

    TopicContent { notes, questions }
}

/// Where missing-content signals go. Delivery failures are the caller's to
/// log; they never stop a session.
pub trait DemandSink {
    fn report_missing_content(&self, topic_owner_id: &str, topic_name: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapStore {
        bundles: HashMap<String, ChapterBundle>,
        fail: bool,
        calls: RefCell<Vec<String>>,
    }

    impl MapStore {
        fn with(key: &str, bundle: ChapterBundle) -> Self {
            let mut store = Self::default();
            store.bundles.insert(key.to_string(), bundle);
            store
        }
    }

    impl ContentStore for MapStore {
        fn fetch(&self, key: &str) -> Result<Option<ChapterBundle>> {
            self.calls.borrow_mut().push(key.to_string());
            if self.fail {
                return Err(Error::Config("store offline".into()));
            }
            Ok(self.bundles.get(key).cloned())
        }
    }

    fn question(id: &str, topic: Option<&str>) -> Question {
        Question {
            id: id.to_string(),
            topic: topic.map(str::to_string),
            prompt: format!("Prompt {}", id),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_option: 1,
            explanation: None,
        }
    }

    fn bundle() -> ChapterBundle {
        ChapterBundle {
            notes: vec![
                NoteChunk {
                    topic: "Light Reaction".into(),
                    content: "Happens in thylakoids".into(),
                },
                NoteChunk {
                    topic: "Calvin Cycle".into(),
                    content: "Fixes carbon".into(),
                },
            ],
            questions: vec![
                question("q1", Some("light reaction")),
                question("q2", Some("Calvin Cycle")),
                question("q3", Some(" Light Reaction ")),
                question("q4", None),
            ],
            content: None,
        }
    }

    fn request(topic: &str) -> ContentRequest {
        ContentRequest {
            topic_owner_id: "bio-7".into(),
            topic_name: topic.into(),
            display_title: "Photosynthesis".into(),
            subject_name: "Biology".into(),
            board: "CBSE".into(),
            level: "10".into(),
            stream: None,
        }
    }

    mod key_tests {
        use super::*;

        #[test]
        fn precise_key_without_stream() {
            assert_eq!(
                request("Calvin Cycle").precise_key(),
                "content_CBSE_10_Biology_bio-7"
            );
        }

        #[test]
        fn precise_key_with_stream() {
            let mut r = request("Calvin Cycle");
            r.level = "12".into();
            r.stream = Some("Science".into());
            assert_eq!(r.precise_key(), "content_CBSE_12-Science_Biology_bio-7");
        }

        #[test]
        fn blank_stream_is_ignored() {
            let mut r = request("Calvin Cycle");
            r.stream = Some("  ".into());
            assert_eq!(r.precise_key(), "content_CBSE_10_Biology_bio-7");
        }
    }

    mod select_tests {
        use super::*;

        #[test]
        fn sub_topic_gets_matching_questions_and_notes() {
            let content = select_topic(&bundle(), &request("Light Reaction"));
            let ids: Vec<_> = content.questions.iter().map(|q| q.id.as_str()).collect();
            assert_eq!(ids, vec!["q1", "q3"]);
            assert_eq!(content.notes.len(), 1);
            assert_eq!(content.notes[0].content, "Happens in thylakoids");
        }

        #[test]
        fn chapter_level_gets_everything() {
            let content = select_topic(&bundle(), &request("photosynthesis"));
            assert_eq!(content.questions.len(), 4);
            assert_eq!(content.notes.len(), 2);
        }

        #[test]
        fn unknown_topic_is_empty() {
            let content = select_topic(&bundle(), &request("Respiration"));
            assert!(content.questions.is_empty());
            assert!(content.notes.is_empty());
        }

        #[test]
        fn unanswerable_questions_are_left_out() {
            let mut b = bundle();
            b.questions[0].options.clear();
            b.questions[2].correct_option = 4;
            let content = select_topic(&b, &request("Light Reaction"));
            assert!(content.questions.is_empty());
        }

        #[test]
        fn chapter_text_stands_in_for_missing_notes() {
            let b = ChapterBundle {
                notes: vec![],
                questions: vec![question("q1", Some("Calvin Cycle"))],
                content: Some("Whole chapter".into()),
            };
            let content = select_topic(&b, &request("Calvin Cycle"));
            assert_eq!(content.notes.len(), 1);
            assert_eq!(content.notes[0].content, "Whole chapter");
        }

        #[test]
        fn chapter_text_ignored_when_notes_exist() {
            let mut b = bundle();
            b.content = Some("Whole chapter".into());
            let content = select_topic(&b, &request("Respiration"));
            assert!(content.notes.is_empty());
        }
    }

    mod resolver_tests {
        use super::*;

        #[test]
        fn cache_hit_skips_remote() {
            let r = request("Calvin Cycle");
            let cache = MapStore::with(&r.precise_key(), bundle());
            let remote = MapStore::default();
            let resolver = TieredResolver::new(&cache, &remote);

            let content = resolver.resolve(&r).unwrap();
            assert_eq!(content.questions.len(), 1);
            assert!(remote.calls.borrow().is_empty());
        }

        #[test]
        fn falls_back_to_remote_precise_then_owner() {
            let r = request("Calvin Cycle");
            let cache = MapStore::default();
            let remote = MapStore::with("bio-7", bundle());
            let resolver = TieredResolver::new(&cache, &remote);

            let content = resolver.resolve(&r).unwrap();
            assert_eq!(content.questions[0].id, "q2");
            assert_eq!(
                *remote.calls.borrow(),
                vec![r.precise_key(), "bio-7".to_string()]
            );
        }

        #[test]
        fn failing_cache_degrades_to_remote() {
            let r = request("Calvin Cycle");
            let cache = MapStore {
                fail: true,
                ..MapStore::default()
            };
            let remote = MapStore::with(&r.precise_key(), bundle());
            let resolver = TieredResolver::new(&cache, &remote);
            assert!(resolver.resolve(&r).is_some());
        }

        #[test]
        fn everything_missing_is_none() {
            let cache = MapStore::default();
            let remote = MapStore {
                fail: true,
                ..MapStore::default()
            };
            let resolver = TieredResolver::new(&cache, &remote);
            assert!(resolver.resolve(&request("Calvin Cycle")).is_none());
        }

        #[test]
        fn bundle_without_topic_questions_keeps_looking() {
            let r = request("Calvin Cycle");
            let mut sparse = bundle();
            sparse.questions.retain(|q| q.id == "q1");
            let cache = MapStore::with(&r.precise_key(), sparse);
            let remote = MapStore::with("bio-7", bundle());
            let resolver = TieredResolver::new(&cache, &remote);

            let content = resolver.resolve(&r).unwrap();
            assert_eq!(content.questions[0].id, "q2");
        }
    }

    mod directory_tests {
        use super::*;

        #[test]
        fn reads_bundle_file() {
            let dir = std::env::temp_dir().join(format!("revhub-content-{}", rand::random::<u32>()));
            fs::create_dir_all(&dir).unwrap();
            fs::write(
                dir.join("bio-7.json"),
                serde_json::to_string(&bundle()).unwrap(),
            )
            .unwrap();

            let store = DirectoryStore::new(Some(dir.clone()));
            let found = store.fetch("bio-7").unwrap().unwrap();
            assert_eq!(found.questions.len(), 4);
            assert!(store.fetch("missing").unwrap().is_none());

            fs::remove_dir_all(&dir).ok();
        }

        #[test]
        fn keys_cannot_leave_the_root() {
            let base = std::env::temp_dir().join(format!("revhub-escape-{}", rand::random::<u32>()));
            let root = base.join("content");
            fs::create_dir_all(&root).unwrap();
            fs::write(
                base.join("outside.json"),
                serde_json::to_string(&bundle()).unwrap(),
            )
            .unwrap();

            let store = DirectoryStore::new(Some(root));
            assert!(store.fetch("../outside").unwrap().is_none());
            assert!(store.fetch("sub/../../outside").unwrap().is_none());

            let mut r = request("Calvin Cycle");
            r.subject_name = "../../etc".into();
            assert!(store.fetch(&r.precise_key()).unwrap().is_none());

            fs::remove_dir_all(&base).ok();
        }

        #[test]
        fn rootless_store_is_empty() {
            assert!(DirectoryStore::default().fetch("any").unwrap().is_none());
        }
    }
}
