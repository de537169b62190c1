//! The ordered checks and rewrites applied to a picked path before anything
//! touches the host's document or the persisted state.
//!
//! Stages run in order; each either hands a (possibly rewritten) outcome to
//! the next one or halts the pipeline. No stage panics on any input.

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use super::error::ChooserError;
use super::profile::{ActionProfile, ExtensionKeyword};
use super::{Filter, Mode, Outcome};

/// Why the pipeline stopped before producing a final path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    /// Nothing was selected.
    Cancelled,
    /// The path is only reachable through the sandbox document broker.
    SandboxRejected { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Proceed(Outcome),
    Halt(Halt),
}

pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, outcome: Outcome) -> Result<Verdict, ChooserError>;
}

// ---------------------------------------------------------------------------
// Stage 1: sandbox path rejection
// ---------------------------------------------------------------------------

/// Rejects paths served through the document portal's FUSE mount
/// (`/run/user/<uid>/doc/<id>/...`). Such paths are per-session proxies, so
/// a project saved there would reference media the host cannot find later.
pub struct SandboxPathRejection {
    pattern: Regex,
}

impl SandboxPathRejection {
    pub const DEFAULT_PATTERN: &'static str = r"^/run/user/[0-9]+/doc(/|$)";

    pub fn new(pattern: &str) -> Result<Self, ChooserError> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn is_reserved(&self, path: &Path) -> bool {
        self.pattern.is_match(&path.to_string_lossy())
    }
}

impl Stage for SandboxPathRejection {
    fn name(&self) -> &'static str {
        "sandbox-path-rejection"
    }

    fn apply(&self, outcome: Outcome) -> Result<Verdict, ChooserError> {
        match &outcome.selected_path {
            Some(path) if self.is_reserved(path) => Ok(Verdict::Halt(Halt::SandboxRejected {
                path: path.clone(),
            })),
            _ => Ok(Verdict::Proceed(outcome)),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage 2: extension normalization
// ---------------------------------------------------------------------------

/// Makes sure a save target carries the extension the user asked for.
///
/// The desired extension is, in order: the one implied by the selected
/// filter's globs, a keyword hit in the filter's label, the one already
/// typed, and finally the profile default. It is appended in upper case to
/// match the host's own save dialog.
pub struct ExtensionNormalization {
    default_extension: String,
    keywords: Vec<ExtensionKeyword>,
}

impl ExtensionNormalization {
    pub fn new(default_extension: &str, keywords: Vec<ExtensionKeyword>) -> Self {
        Self {
            default_extension: default_extension.trim_start_matches('.').to_ascii_lowercase(),
            keywords,
        }
    }

    pub fn for_profile(profile: &ActionProfile) -> Self {
        Self::new(&profile.default_extension, profile.extension_keywords.clone())
    }

    /// Lower-case extension the final path must end with.
    pub fn desired_extension(&self, path: &Path, filter: Option<&Filter>) -> String {
        if let Some(extension) = filter.and_then(filter_extension) {
            return extension;
        }
        if let Some(extension) = filter.and_then(|f| self.keyword_extension(&f.label)) {
            return extension;
        }
        if let Some(extension) = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .filter(|e| !e.is_empty())
        {
            return extension;
        }
        self.default_extension.clone()
    }

    fn keyword_extension(&self, label: &str) -> Option<String> {
        let label = label.to_lowercase();
        self.keywords
            .iter()
            .find(|k| !k.keyword.is_empty() && label.contains(&k.keyword.to_lowercase()))
            .map(|k| k.extension.trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
    }

    pub fn normalize(&self, path: &Path, filter: Option<&Filter>) -> PathBuf {
        let Some(file_name) = path.file_name() else {
            return path.to_path_buf();
        };
        let desired = self.desired_extension(path, filter);
        let name = file_name.to_string_lossy();
        if desired.is_empty() || ends_with_extension(&name, &desired) {
            return path.to_path_buf();
        }

        let mut renamed = file_name.to_os_string();
        if !name.ends_with('.') {
            renamed.push(".");
        }
        renamed.push(desired.to_ascii_uppercase());
        path.with_file_name(renamed)
    }
}

/// ASCII case-insensitive check for a `.<extension>` suffix.
fn ends_with_extension(name: &str, extension: &str) -> bool {
    let name = name.as_bytes();
    let suffix_len = extension.len() + 1;
    if name.len() < suffix_len {
        return false;
    }
    let tail = &name[name.len() - suffix_len..];
    tail[0] == b'.' && tail[1..].eq_ignore_ascii_case(extension.as_bytes())
}

/// Extension implied by the first glob of the form `*.ext` (or `PREFIX*.ext`).
/// Catch-alls such as `*.*` imply nothing.
pub fn filter_extension(filter: &Filter) -> Option<String> {
    filter.patterns.iter().find_map(|pattern| {
        let (_, tail) = pattern.rsplit_once('*')?;
        let extension = tail.strip_prefix('.')?;
        let concrete = !extension.is_empty()
            && !extension.ends_with('.')
            && !extension.contains(|c: char| "*?[]{}/".contains(c));
        concrete.then(|| extension.to_ascii_lowercase())
    })
}

impl Stage for ExtensionNormalization {
    fn name(&self) -> &'static str {
        "extension-normalization"
    }

    fn apply(&self, mut outcome: Outcome) -> Result<Verdict, ChooserError> {
        if let Some(path) = &outcome.selected_path {
            let normalized = self.normalize(path, outcome.selected_filter.as_ref());
            if &normalized != path {
                tracing::debug!("Normalized {:?} to {:?}", path, normalized);
            }
            outcome.selected_path = Some(normalized);
        }
        Ok(Verdict::Proceed(outcome))
    }
}

// ---------------------------------------------------------------------------
// Stage 3: subdirectory materialization
// ---------------------------------------------------------------------------

/// When its checkbox is ticked, moves the target into a directory named after
/// the file (`/a/Song.RPP` becomes `/a/Song/Song.RPP`), creating it if needed.
pub struct SubdirectoryMaterialization {
    option_key: String,
    placeholder: String,
}

impl SubdirectoryMaterialization {
    pub fn new(option_key: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            option_key: option_key.into(),
            placeholder: placeholder.into(),
        }
    }

    /// Name of the directory that will hold `path`.
    pub fn directory_name(&self, path: &Path) -> String {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = match name.rsplit_once('.') {
            Some((stem, _)) => stem,
            None => name.as_str(),
        };
        if stem.trim().is_empty() {
            self.placeholder.clone()
        } else {
            stem.to_string()
        }
    }

    /// Creates the directory (a no-op if it already exists) and returns the
    /// relocated path.
    pub fn materialize(&self, path: &Path) -> Result<PathBuf, ChooserError> {
        let Some(file_name) = path.file_name() else {
            return Ok(path.to_path_buf());
        };
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let directory = parent.join(self.directory_name(path));

        fs::create_dir_all(&directory)
            .map_err(|e| ChooserError::DirectoryCreate(e, directory.clone()))?;
        tracing::info!("Project directory ready: {:?}", directory);

        Ok(directory.join(file_name))
    }
}

impl Stage for SubdirectoryMaterialization {
    fn name(&self) -> &'static str {
        "subdirectory-materialization"
    }

    fn apply(&self, mut outcome: Outcome) -> Result<Verdict, ChooserError> {
        if !outcome.option(&self.option_key) {
            return Ok(Verdict::Proceed(outcome));
        }
        if let Some(path) = &outcome.selected_path {
            outcome.selected_path = Some(self.materialize(path)?);
        }
        Ok(Verdict::Proceed(outcome))
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct PolicyPipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl PolicyPipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Sandbox rejection always; extension normalization for save actions;
    /// subdirectory materialization when the profile declares its checkbox.
    pub fn for_profile(profile: &ActionProfile, sandbox: SandboxPathRejection) -> Self {
        let mut stages: Vec<Box<dyn Stage>> = vec![Box::new(sandbox)];
        if profile.mode == Mode::Save {
            stages.push(Box::new(ExtensionNormalization::for_profile(profile)));
        }
        if let Some(key) = &profile.hooks.subdirectory {
            stages.push(Box::new(SubdirectoryMaterialization::new(
                key.clone(),
                profile.placeholder_directory.clone(),
            )));
        }
        Self::new(stages)
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn run(&self, mut outcome: Outcome) -> Result<Verdict, ChooserError> {
        if outcome.is_cancelled() {
            return Ok(Verdict::Halt(Halt::Cancelled));
        }
        for stage in &self.stages {
            match stage.apply(outcome)? {
                Verdict::Proceed(next) => outcome = next,
                Verdict::Halt(halt) => {
                    tracing::debug!("Stage '{}' halted the pipeline: {:?}", stage.name(), halt);
                    return Ok(Verdict::Halt(halt));
                }
            }
        }
        Ok(Verdict::Proceed(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::profile::CREATE_SUBDIR;
    use crate::utils::test_helpers::setup_test_logging;
    use std::collections::BTreeMap;

    fn sandbox() -> SandboxPathRejection {
        SandboxPathRejection::new(SandboxPathRejection::DEFAULT_PATTERN).unwrap()
    }

    fn normalizer() -> ExtensionNormalization {
        ExtensionNormalization::for_profile(&ActionProfile::save_project())
    }

    fn picked(path: &str, filter: Option<Filter>, options: &[(&str, bool)]) -> Outcome {
        Outcome {
            selected_path: Some(PathBuf::from(path)),
            selected_filter: filter,
            options: options
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn rpp_filter() -> Filter {
        Filter::new("Project files (*.RPP)", &["*.RPP"])
    }

    #[test]
    fn test_sandbox_pattern() {
        let rule = sandbox();
        assert!(rule.is_reserved(Path::new("/run/user/1000/doc/ab12cd/song.RPP")));
        assert!(rule.is_reserved(Path::new("/run/user/0/doc")));
        assert!(!rule.is_reserved(Path::new("/run/user/1000/documents/song.RPP")));
        assert!(!rule.is_reserved(Path::new("/run/user/abc/doc/song.RPP")));
        assert!(!rule.is_reserved(Path::new("/home/u/run/user/1000/doc/song.RPP")));
    }

    #[test]
    fn test_invalid_sandbox_pattern_is_an_error() {
        assert!(matches!(
            SandboxPathRejection::new("(unclosed"),
            Err(ChooserError::InvalidSandboxPattern(_))
        ));
    }

    #[test]
    fn test_filter_extension() {
        assert_eq!(filter_extension(&rpp_filter()), Some("rpp".to_string()));
        assert_eq!(
            filter_extension(&Filter::new("RADAR", &["PROJ*.TXT"])),
            Some("txt".to_string())
        );
        assert_eq!(
            filter_extension(&Filter::new("Backup", &["*.RPP-BAK"])),
            Some("rpp-bak".to_string())
        );
        assert_eq!(filter_extension(&Filter::new("All files (*.*)", &["*.*"])), None);
        assert_eq!(filter_extension(&Filter::new("All", &["*"])), None);
        assert_eq!(filter_extension(&Filter::new("Log", &["clipsort.log"])), None);
        assert_eq!(
            filter_extension(&Filter::new("Mixed", &["*.*", "*.edl"])),
            Some("edl".to_string())
        );
    }

    #[test]
    fn test_extension_priority_filter_first() {
        let n = normalizer();
        let filter = Filter::new("Project backup", &["*.EDL"]);
        assert_eq!(n.desired_extension(Path::new("/a/song.txt"), Some(&filter)), "edl");
    }

    #[test]
    fn test_extension_priority_label_keyword_second() {
        let n = normalizer();
        let filter = Filter {
            label: "REAPER Project Backup files".to_string(),
            patterns: Vec::new(),
        };
        assert_eq!(n.desired_extension(Path::new("/a/song.txt"), Some(&filter)), "rpp-bak");

        let vegas = Filter::new("EDL TXT (Vegas) files", &["*.*"]);
        assert_eq!(n.desired_extension(Path::new("/a/song"), Some(&vegas)), "txt");
    }

    #[test]
    fn test_extension_priority_typed_then_default() {
        let n = normalizer();
        let plain = Filter::new("All files (*.*)", &["*.*"]);
        assert_eq!(n.desired_extension(Path::new("/a/song.Edl"), Some(&plain)), "edl");
        assert_eq!(n.desired_extension(Path::new("/a/song"), Some(&plain)), "rpp");
        assert_eq!(n.desired_extension(Path::new("/a/song."), None), "rpp");
    }

    #[test]
    fn test_normalize_appends_upper_case() {
        let n = normalizer();
        assert_eq!(
            n.normalize(Path::new("/home/u/proj"), Some(&rpp_filter())),
            PathBuf::from("/home/u/proj.RPP")
        );
        assert_eq!(
            n.normalize(Path::new("/home/u/take.wav"), Some(&rpp_filter())),
            PathBuf::from("/home/u/take.wav.RPP")
        );
        assert_eq!(
            n.normalize(Path::new("/home/u/song."), None),
            PathBuf::from("/home/u/song.RPP")
        );
    }

    #[test]
    fn test_normalize_keeps_existing_extension_any_case() {
        let n = normalizer();
        for path in ["/home/u/a.rpp", "/home/u/a.RPP", "/home/u/a.Rpp"] {
            assert_eq!(n.normalize(Path::new(path), Some(&rpp_filter())), PathBuf::from(path));
        }
        assert_eq!(n.normalize(Path::new("/"), None), PathBuf::from("/"));
    }

    #[test]
    fn test_subdirectory_name() {
        let stage = SubdirectoryMaterialization::new(CREATE_SUBDIR, "Untitled");
        assert_eq!(stage.directory_name(Path::new("/a/MySong.RPP")), "MySong");
        assert_eq!(stage.directory_name(Path::new("/a/My.Song.RPP")), "My.Song");
        assert_eq!(stage.directory_name(Path::new("/a/NoExt")), "NoExt");
        assert_eq!(stage.directory_name(Path::new("/a/.RPP")), "Untitled");
    }

    #[test]
    fn test_subdirectory_materialization_is_idempotent() {
        setup_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let stage = SubdirectoryMaterialization::new(CREATE_SUBDIR, "Untitled");
        let chosen = dir.path().join("MySong.RPP");

        let first = stage.materialize(&chosen).unwrap();
        let second = stage.materialize(&chosen).unwrap();

        assert_eq!(first, dir.path().join("MySong").join("MySong.RPP"));
        assert_eq!(first, second);
        assert!(dir.path().join("MySong").is_dir());
        assert_eq!(
            first.parent().unwrap().file_name().unwrap(),
            std::ffi::OsStr::new("MySong")
        );
    }

    #[test]
    fn test_subdirectory_blocked_by_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("MySong"), "not a directory").unwrap();
        let stage = SubdirectoryMaterialization::new(CREATE_SUBDIR, "Untitled");

        let result = stage.materialize(&dir.path().join("MySong.RPP"));
        assert!(matches!(
            result,
            Err(ChooserError::DirectoryCreate(_, p)) if p == dir.path().join("MySong")
        ));
    }

    #[test]
    fn test_subdirectory_stage_only_when_ticked() {
        let dir = tempfile::tempdir().unwrap();
        let stage = SubdirectoryMaterialization::new(CREATE_SUBDIR, "Untitled");
        let path = dir.path().join("Song.RPP");
        let outcome = picked(path.to_str().unwrap(), None, &[(CREATE_SUBDIR, false)]);

        assert_eq!(stage.apply(outcome.clone()).unwrap(), Verdict::Proceed(outcome));
        assert!(!dir.path().join("Song").exists());
    }

    #[test]
    fn test_pipeline_stages_per_profile() {
        let save = PolicyPipeline::for_profile(&ActionProfile::save_project(), sandbox());
        assert_eq!(
            save.stage_names(),
            vec![
                "sandbox-path-rejection",
                "extension-normalization",
                "subdirectory-materialization"
            ]
        );
        let open = PolicyPipeline::for_profile(&ActionProfile::open_project(), sandbox());
        assert_eq!(open.stage_names(), vec!["sandbox-path-rejection"]);
    }

    #[test]
    fn test_pipeline_full_save() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = PolicyPipeline::for_profile(&ActionProfile::save_project(), sandbox());
        let chosen = dir.path().join("MySong");
        let outcome = picked(
            chosen.to_str().unwrap(),
            Some(rpp_filter()),
            &[(CREATE_SUBDIR, true)],
        );

        let Verdict::Proceed(result) = pipeline.run(outcome).unwrap() else {
            panic!("pipeline halted");
        };
        assert_eq!(
            result.selected_path,
            Some(dir.path().join("MySong").join("MySong.RPP"))
        );
    }

    #[test]
    fn test_pipeline_halts_on_sandbox_path_before_later_stages() {
        let pipeline = PolicyPipeline::for_profile(&ActionProfile::save_project(), sandbox());
        let outcome = picked(
            "/run/user/1000/doc/f00d/Song",
            Some(rpp_filter()),
            &[(CREATE_SUBDIR, true)],
        );

        assert_eq!(
            pipeline.run(outcome).unwrap(),
            Verdict::Halt(Halt::SandboxRejected {
                path: PathBuf::from("/run/user/1000/doc/f00d/Song")
            })
        );
    }

    #[test]
    fn test_pipeline_cancelled_outcome() {
        let pipeline = PolicyPipeline::for_profile(&ActionProfile::save_project(), sandbox());
        assert_eq!(
            pipeline.run(Outcome::cancelled()).unwrap(),
            Verdict::Halt(Halt::Cancelled)
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        fn any_filter() -> impl Strategy<Value = Option<Filter>> {
            proptest::option::of(
                (
                    "[A-Za-z ()*.-]{0,24}",
                    proptest::collection::vec("[A-Za-z*.?]{0,8}", 0..3),
                )
                    .prop_map(|(label, patterns)| Filter { label, patterns }),
            )
        }

        /// `/run/user/<uid>/doc` followed by zero or more path segments.
        fn broker_path() -> impl Strategy<Value = String> {
            (
                "[0-9]{1,10}",
                proptest::collection::vec("[A-Za-z0-9 _.-]{1,12}", 0..4),
                any::<bool>(),
            )
                .prop_map(|(uid, segments, trailing_slash)| {
                    let mut path = format!("/run/user/{}/doc", uid);
                    for segment in segments {
                        path.push('/');
                        path.push_str(&segment);
                    }
                    if trailing_slash {
                        path.push('/');
                    }
                    path
                })
        }

        /// Counts how often the pipeline reached it.
        struct CountingStage(Arc<AtomicUsize>);

        impl Stage for CountingStage {
            fn name(&self) -> &'static str {
                "counting"
            }

            fn apply(&self, outcome: Outcome) -> Result<Verdict, ChooserError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(Verdict::Proceed(outcome))
            }
        }

        proptest! {
            #[test]
            fn broker_paths_always_halt_before_later_stages(
                path in broker_path(),
                create_subdir in any::<bool>(),
                filter in any_filter(),
            ) {
                let outcome = picked(&path, filter, &[(CREATE_SUBDIR, create_subdir)]);
                let expected = Verdict::Halt(Halt::SandboxRejected {
                    path: PathBuf::from(&path),
                });

                for profile in ActionProfile::builtin() {
                    let pipeline = PolicyPipeline::for_profile(&profile, sandbox());
                    prop_assert_eq!(pipeline.run(outcome.clone()).unwrap(), expected.clone());
                }

                let reached = Arc::new(AtomicUsize::new(0));
                let pipeline = PolicyPipeline::new(vec![
                    Box::new(sandbox()),
                    Box::new(CountingStage(reached.clone())),
                ]);
                prop_assert_eq!(pipeline.run(outcome).unwrap(), expected);
                prop_assert_eq!(reached.load(Ordering::SeqCst), 0);
            }

            #[test]
            fn normalization_is_idempotent(
                name in "[A-Za-z0-9 _.-]{1,20}",
                filter in any_filter(),
            ) {
                let n = normalizer();
                let path = PathBuf::from("/home/u").join(&name);
                let once = n.normalize(&path, filter.as_ref());
                let twice = n.normalize(&once, filter.as_ref());
                prop_assert_eq!(once, twice);
            }

            #[test]
            fn matching_extension_in_any_case_is_untouched(
                stem in "[A-Za-z0-9_-]{1,16}",
                upper in proptest::collection::vec(any::<bool>(), 3),
            ) {
                let ext: String = "rpp"
                    .chars()
                    .zip(upper)
                    .map(|(c, up)| if up { c.to_ascii_uppercase() } else { c })
                    .collect();
                let path = PathBuf::from(format!("/home/u/{}.{}", stem, ext));
                prop_assert_eq!(n_rpp(&path), path);
            }

            #[test]
            fn missing_extension_is_appended_upper_case(stem in "[A-Za-z0-9_-]{1,16}") {
                let path = PathBuf::from(format!("/home/u/{}", stem));
                let expected = PathBuf::from(format!("/home/u/{}.RPP", stem));
                prop_assert_eq!(n_rpp(&path), expected);
            }
        }

        fn n_rpp(path: &Path) -> PathBuf {
            normalizer().normalize(path, Some(&rpp_filter()))
        }
    }
}
