//! Regenerate lesson pagers and session menus from the course outlines.

use std::collections::HashSet;

use tracing::{debug, info, instrument, warn};

use lessonforge_markup::{CourseMap, Element, navigate};
use lessonforge_shared::{DocKey, ElementAnchor, NavigationConfig, Result};
use lessonforge_store::DocumentStore;

use crate::report::BatchReport;
use crate::task::{ProgressReporter, RunOptions, collect_keys, persist};

/// Rule count key for documents whose navigation changed.
pub const NAVIGATION_COUNT: &str = "lesson navigation";

/// Rewrites navigation for every outlined collection.
#[derive(Debug)]
pub struct Navigator<'a> {
    store: &'a DocumentStore,
    courses: Vec<CourseMap>,
    pager: Element,
    menu: Option<Element>,
}

impl<'a> Navigator<'a> {
    pub fn new(store: &'a DocumentStore, config: &NavigationConfig) -> Result<Self> {
        let courses = config
            .courses
            .iter()
            .map(CourseMap::new)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            store,
            courses,
            pager: element(&config.pager),
            menu: config.menu.as_ref().map(element),
        })
    }

    /// Collections that have an outline.
    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.courses.iter().map(CourseMap::collection)
    }

    /// Rewrite the outlined collections among `collections` (all of them
    /// when empty). Documents outside the outline are skipped, and so are
    /// outline entries with no document.
    #[instrument(skip_all, fields(courses = self.courses.len()))]
    pub fn run(
        &self,
        collections: &[String],
        opts: RunOptions,
        progress: &dyn ProgressReporter,
    ) -> Result<BatchReport> {
        let wanted: HashSet<&str> = collections.iter().map(String::as_str).collect();
        for collection in &wanted {
            if !self.collections().any(|c| c == *collection) {
                warn!(collection, "no course outline, skipping collection");
            }
        }

        let mut batches = Vec::new();
        for course in &self.courses {
            if wanted.is_empty() || wanted.contains(course.collection()) {
                let keys = collect_keys(self.store, &[course.collection().to_string()])?;
                batches.push((course, keys));
            }
        }

        let total = batches.iter().map(|(_, keys)| keys.len()).sum();
        let mut report = BatchReport::new("navigate", opts.dry_run);
        progress.start("navigate", total);

        let mut current = 0;
        for (course, keys) in batches {
            for key in &keys {
                current += 1;
                progress.document(key, current, total);
                if !course.contains(&key.name) {
                    debug!(%key, "not in course outline");
                    report.record_skip(key.clone(), "not in the course outline");
                    continue;
                }
                if let Err(e) = self.navigate_one(course, key, opts, &mut report) {
                    warn!(%key, error = %e, "navigation failed");
                    report.record_failure(key.clone(), &e);
                }
            }

            let present: HashSet<&str> = keys.iter().map(|k| k.name.as_str()).collect();
            for file in course.files().filter(|f| !present.contains(f)) {
                report.record_skip(
                    DocKey::new(course.collection(), file),
                    "listed in the outline but missing",
                );
            }
        }

        info!(
            succeeded = report.succeeded,
            modified = report.modified,
            skipped = report.skipped.len(),
            "navigation complete"
        );
        progress.done(&report.to_string());
        Ok(report)
    }

    fn navigate_one(
        &self,
        course: &CourseMap,
        key: &DocKey,
        opts: RunOptions,
        report: &mut BatchReport,
    ) -> Result<()> {
        let mut doc = self.store.load(key)?;
        let Some(nav) = navigate(
            doc.original(),
            course,
            &key.name,
            &self.pager,
            self.menu.as_ref(),
        )?
        else {
            return Ok(());
        };

        doc.body = nav.text;
        let modified = persist(self.store, &doc, opts)?;
        report.record_success(modified);
        if modified {
            report.count(NAVIGATION_COUNT, 1);
        }
        for anchor in nav.missing {
            report.record_warning(key.clone(), format!("{anchor}: anchor missing"));
        }
        Ok(())
    }
}

fn element(anchor: &ElementAnchor) -> Element {
    Element::new(anchor.tag.trim()).with_class(anchor.class.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::SilentProgress;
    use crate::testutil::{fixture, get, put, store, temp_corpus};
    use lessonforge_shared::{CourseOutline, ErrorKind, NavLink, OutlineLesson, OutlineSession};

    fn config() -> NavigationConfig {
        let lesson = |file: &str, title: &str| OutlineLesson {
            file: file.into(),
            title: Some(title.into()),
        };
        NavigationConfig {
            menu: Some(ElementAnchor {
                tag: "aside".into(),
                class: "sidebar".into(),
            }),
            courses: vec![CourseOutline {
                collection: "module-01".into(),
                after_last: Some(NavLink {
                    href: "/module-02/index.html".into(),
                    title: "Module 2".into(),
                }),
                sessions: vec![
                    OutlineSession {
                        title: "Session 1: Basics".into(),
                        lessons: vec![lesson("a.html", "Alpha"), lesson("b.html", "Beta")],
                    },
                    OutlineSession {
                        title: "Session 2: More".into(),
                        lessons: vec![lesson("c.html", "Gamma")],
                    },
                ],
                ..CourseOutline::default()
            }],
            ..NavigationConfig::default()
        }
    }

    fn collections() -> Vec<String> {
        vec!["module-01".to_string()]
    }

    #[test]
    fn rewrites_outlined_lessons_and_is_idempotent() {
        let root = temp_corpus();
        let template = fixture("template_lesson.html");
        put(&root, "module-01", "a.html", &template);
        put(&root, "module-01", "c.html", &template);
        put(&root, "module-01", "extra.html", &template);
        let s = store(&root);
        let navigator = Navigator::new(&s, &config()).unwrap();

        let first = navigator
            .run(&collections(), RunOptions::default(), &SilentProgress)
            .unwrap();
        assert_eq!(first.succeeded, 2);
        assert_eq!(first.modified, 2);
        assert_eq!(first.rule_counts[NAVIGATION_COUNT], 2);
        let skipped: Vec<_> = first.skipped.iter().map(|n| n.key.name.as_str()).collect();
        assert_eq!(skipped, vec!["extra.html", "b.html"]);

        let a = get(&root, "module-01", "a.html");
        assert!(a.contains(r#"<a class="lesson-nav-button next" href="/module-01/b.html">"#));
        assert!(!a.contains("lesson-nav-button prev"));
        assert!(a.contains(r#"aria-current="page">Alpha</a>"#));
        assert!(!a.contains("/module-01/previous.html"));
        let c = get(&root, "module-01", "c.html");
        assert!(c.contains(r#"href="/module-02/index.html">"#));
        assert!(c.contains(r#"prev-session" href="/module-01/a.html">&larr; Session 1: Basics"#));
        assert_eq!(get(&root, "module-01", "extra.html"), template);

        let second = navigator
            .run(&collections(), RunOptions::default(), &SilentProgress)
            .unwrap();
        assert_eq!(second.modified, 0);
        assert!(second.rule_counts.is_empty());
        assert_eq!(get(&root, "module-01", "a.html"), a);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_anchor_is_a_warning() {
        let root = temp_corpus();
        put(&root, "module-01", "a.html", "<body><p>no nav</p></body>");
        let s = store(&root);
        let report = Navigator::new(&s, &config())
            .unwrap()
            .run(&collections(), RunOptions::default(), &SilentProgress)
            .unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.modified, 0);
        assert_eq!(report.warnings.len(), 2);
        assert!(report.failures.is_empty());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn duplicated_pager_fails_only_that_document() {
        let root = temp_corpus();
        let template = fixture("template_lesson.html");
        let doubled = template.replace(
            "</article>",
            "<nav class=\"lesson-nav\"></nav>\n        </article>",
        );
        put(&root, "module-01", "a.html", &template);
        put(&root, "module-01", "b.html", &doubled);
        let s = store(&root);
        let report = Navigator::new(&s, &config())
            .unwrap()
            .run(&collections(), RunOptions::default(), &SilentProgress)
            .unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, ErrorKind::Configuration);
        assert_eq!(get(&root, "module-01", "b.html"), doubled);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn unoutlined_collections_are_left_alone() {
        let root = temp_corpus();
        let template = fixture("template_lesson.html");
        put(&root, "module-01", "a.html", &template);
        put(&root, "module-02", "a.html", &template);
        let s = store(&root);
        let report = Navigator::new(&s, &config())
            .unwrap()
            .run(&["module-02".to_string()], RunOptions::default(), &SilentProgress)
            .unwrap();
        assert_eq!(report.total(), 0);
        assert_eq!(get(&root, "module-01", "a.html"), template);
        assert_eq!(get(&root, "module-02", "a.html"), template);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let root = temp_corpus();
        let template = fixture("template_lesson.html");
        put(&root, "module-01", "a.html", &template);
        let s = store(&root);
        let report = Navigator::new(&s, &config())
            .unwrap()
            .run(
                &collections(),
                RunOptions {
                    dry_run: true,
                    backup: true,
                },
                &SilentProgress,
            )
            .unwrap();
        assert_eq!(report.modified, 1);
        assert_eq!(get(&root, "module-01", "a.html"), template);
        assert!(!root.join("module-01/backups").exists());
        let _ = std::fs::remove_dir_all(&root);
    }
}
