//! Template composition.
//!
//! Pages are plain HTML files containing `%KEY%` placeholders. A
//! `TemplateVariables` set maps keys to value producers that are evaluated on
//! every render, so a page always shows the current miner state.
//!
//! A page is assembled in two steps: the content fragment is rendered first
//! and then injected into the layout as the `CONTENT` variable. Substituted
//! values are never scanned again, so a value containing `%KEY%` text is
//! emitted verbatim.

use std::collections::HashMap;
use std::fmt;
use std::ops::Add;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::{WebError, WebResult};

/// Key under which the rendered content fragment is handed to the layout.
pub const CONTENT_KEY: &str = "CONTENT";

/// Name of the layout template every page is wrapped in.
pub const LAYOUT_TEMPLATE: &str = "layout";

/// Lazily evaluated template value.
pub type Variable = Arc<dyn Fn() -> String + Send + Sync>;

/// A set of `%KEY%` -> value producer mappings.
#[derive(Clone, Default)]
pub struct TemplateVariables {
    variables: HashMap<String, Variable>,
}

impl TemplateVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a lazily evaluated variable (builder style).
    pub fn with<F>(mut self, key: impl Into<String>, producer: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.insert(key, producer);
        self
    }

    /// Add a constant variable (builder style).
    pub fn with_value(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        self.with(key, move || value.clone())
    }

    /// Add or replace a variable.
    pub fn insert<F>(&mut self, key: impl Into<String>, producer: F)
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.variables.insert(key.into(), Arc::new(producer));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Evaluate a single variable.
    pub fn value(&self, key: &str) -> Option<String> {
        self.variables.get(key).map(|producer| producer())
    }

    /// Right-biased union: entries of `other` win on key collision.
    pub fn combine(&self, other: &TemplateVariables) -> TemplateVariables {
        let mut variables = self.variables.clone();
        variables.extend(
            other
                .variables
                .iter()
                .map(|(key, producer)| (key.clone(), Arc::clone(producer))),
        );
        TemplateVariables { variables }
    }

    /// Replace every known `%KEY%` in `source`.
    ///
    /// Unknown keys and stray `%` characters are left as they are.
    pub fn render(&self, source: &str) -> String {
        let mut out = String::with_capacity(source.len());
        let mut rest = source;

        while let Some(open) = rest.find('%') {
            out.push_str(&rest[..open]);
            let after_open = &rest[open + 1..];

            let Some(close) = after_open.find('%') else {
                out.push_str(&rest[open..]);
                return out;
            };

            let key = &after_open[..close];
            match self.variables.get(key) {
                Some(producer) if is_key(key) => {
                    out.push_str(&producer());
                    rest = &after_open[close + 1..];
                }
                _ => {
                    // The closing '%' may open the next placeholder.
                    out.push('%');
                    rest = after_open;
                }
            }
        }

        out.push_str(rest);
        out
    }

    /// In-place variant of [`render`](Self::render).
    pub fn inject(&self, source: &mut String) {
        *source = self.render(source);
    }
}

fn is_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

impl Add for TemplateVariables {
    type Output = TemplateVariables;

    fn add(mut self, rhs: TemplateVariables) -> TemplateVariables {
        self.variables.extend(rhs.variables);
        self
    }
}

impl fmt::Debug for TemplateVariables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.variables.keys().collect();
        keys.sort();
        f.debug_struct("TemplateVariables")
            .field("keys", &keys)
            .finish()
    }
}

/// Page templates loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: HashMap<String, Arc<str>>,
}

impl TemplateStore {
    /// Load every `*.html` file of `dir`, keyed by file stem.
    ///
    /// Fails when the directory or a file cannot be read, or when one of the
    /// `required` templates is missing.
    pub fn load(dir: &Path, required: &[&str]) -> WebResult<Self> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            WebError::Template(format!("cannot read template dir {}: {e}", dir.display()))
        })?;

        let mut templates = HashMap::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let source = std::fs::read_to_string(&path).map_err(|e| {
                WebError::Template(format!("cannot read template {}: {e}", path.display()))
            })?;
            debug!(template = name, bytes = source.len(), "Loaded template");
            templates.insert(name.to_string(), Arc::from(source));
        }

        let store = Self { templates };
        for name in required {
            store.get(name)?;
        }
        Ok(store)
    }

    /// Build a store from in-memory sources.
    pub fn from_sources<I, K, V>(sources: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let templates = sources
            .into_iter()
            .map(|(k, v)| (k.into(), Arc::from(v.as_ref())))
            .collect();
        Self { templates }
    }

    pub fn get(&self, name: &str) -> WebResult<&str> {
        self.templates
            .get(name)
            .map(|s| s.as_ref())
            .ok_or_else(|| WebError::Template(format!("template {name} not loaded")))
    }

    /// Render `content` inside the layout.
    ///
    /// The content fragment sees `globals + vars`; the layout additionally
    /// gets the rendered fragment as `%CONTENT%`.
    pub fn page(
        &self,
        content: &str,
        globals: &TemplateVariables,
        vars: &TemplateVariables,
    ) -> WebResult<String> {
        let layout = self.get(LAYOUT_TEMPLATE)?;
        let fragment_vars = globals.combine(vars);
        let fragment = fragment_vars.render(self.get(content)?);

        let page_vars = fragment_vars.with_value(CONTENT_KEY, fragment);
        Ok(page_vars.render(layout))
    }
}

/// Escape text for inclusion in HTML element content or attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_render_known_and_unknown_keys() {
        let vars = TemplateVariables::new().with_value("NAME", "rig-01");
        assert_eq!(
            vars.render("<h1>%NAME%</h1><p>%MISSING%</p>"),
            "<h1>rig-01</h1><p>%MISSING%</p>"
        );
    }

    #[test]
    fn test_render_stray_percent_signs() {
        let vars = TemplateVariables::new().with_value("LOAD", "42");
        assert_eq!(vars.render("at 100% load %LOAD%%"), "at 100% load 42%");
        assert_eq!(vars.render("%"), "%");
        assert_eq!(vars.render("%%LOAD%"), "%42");
        assert_eq!(vars.render("%LOAD"), "%LOAD");
    }

    #[test]
    fn test_render_is_repeatable() {
        let vars = TemplateVariables::new()
            .with_value("A", "1")
            .with_value("B", "2");
        let template = "%A%-%B%-%C%";
        let first = vars.render(template);
        assert_eq!(first, "1-2-%C%");
        assert_eq!(vars.render(template), first);
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let vars = TemplateVariables::new()
            .with_value("A", "%B%")
            .with_value("B", "secret");
        assert_eq!(vars.render("%A%"), "%B%");
    }

    #[test]
    fn test_producers_evaluated_on_every_render() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let vars = TemplateVariables::new().with("N", move || {
            (counter.fetch_add(1, Ordering::SeqCst) + 1).to_string()
        });

        assert_eq!(vars.render("%N%"), "1");
        assert_eq!(vars.render("%N%"), "2");
        assert_eq!(vars.render("no keys"), "no keys");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_combine_is_right_biased() {
        let a = TemplateVariables::new()
            .with_value("SHARED", "a")
            .with_value("ONLY_A", "a");
        let b = TemplateVariables::new()
            .with_value("SHARED", "b")
            .with_value("ONLY_B", "b");

        let combined = a.combine(&b);
        assert_eq!(combined.len(), 3);
        assert_eq!(combined.value("SHARED").as_deref(), Some("b"));
        assert_eq!(combined.value("ONLY_A").as_deref(), Some("a"));
        assert_eq!(combined.value("ONLY_B").as_deref(), Some("b"));

        let added = a + b;
        assert_eq!(added.value("SHARED").as_deref(), Some("b"));
        assert_eq!(added.len(), 3);
    }

    #[test]
    fn test_inject_in_place() {
        let vars = TemplateVariables::new().with_value("X", "y");
        let mut source = String::from("x=%X%");
        vars.inject(&mut source);
        assert_eq!(source, "x=y");
    }

    #[test]
    fn test_page_composition() {
        let store = TemplateStore::from_sources([
            ("layout", "<title>%TITLE%</title><main>%CONTENT%</main>"),
            ("dashboard", "<p>%TITLE%: %HEIGHT%</p>"),
            ("login", "<form>%HEIGHT%</form>"),
        ]);
        let globals = TemplateVariables::new().with_value("TITLE", "minerd");
        let vars = TemplateVariables::new().with_value("HEIGHT", "1200");

        let page = store.page("dashboard", &globals, &vars).unwrap();
        assert_eq!(page, "<title>minerd</title><main><p>minerd: 1200</p></main>");

        let login = store
            .page("login", &globals, &TemplateVariables::new())
            .unwrap();
        assert_eq!(login, "<title>minerd</title><main><form>%HEIGHT%</form></main>");
    }

    #[test]
    fn test_content_cannot_override_fragment() {
        let store = TemplateStore::from_sources([
            ("layout", "[%CONTENT%]"),
            ("page", "body"),
        ]);
        let vars = TemplateVariables::new().with_value(CONTENT_KEY, "spoofed");
        let page = store.page("page", &TemplateVariables::new(), &vars).unwrap();
        assert_eq!(page, "[body]");
    }

    #[test]
    fn test_missing_template() {
        let store = TemplateStore::from_sources([("layout", "%CONTENT%")]);
        assert!(store
            .page("settings", &TemplateVariables::new(), &TemplateVariables::new())
            .is_err());
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("layout.html"), "%CONTENT%").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = TemplateStore::load(dir.path(), &["layout"]).unwrap();
        assert_eq!(store.get("layout").unwrap(), "%CONTENT%");
        assert!(store.get("notes").is_err());

        assert!(TemplateStore::load(dir.path(), &["layout", "dashboard"]).is_err());
        assert!(TemplateStore::load(&dir.path().join("nope"), &[]).is_err());
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }
}
