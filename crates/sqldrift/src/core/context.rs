//! Engine context: the process-wide state, explicitly constructed and
//! injected rather than reached through singletons.
//!
//! Three things live here: a scratch-buffer free list for SQL rendering,
//! the parsed-template cache, and the driver registry. Tests build their
//! own context to stay isolated; nothing in the core falls through to a
//! global.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::drivers::DriverRegistry;
use crate::error::{DriftError, Result};

/// Buffers above this capacity are dropped instead of pooled.
const MAX_POOLED_CAPACITY: usize = 64 * 1024;

/// Thread-safe free list of reusable `String` scratch buffers.
#[derive(Debug, Default)]
pub struct BufferPool {
    pool: Mutex<Vec<String>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a cleared buffer from the pool, or allocate a fresh one.
    pub fn acquire(&self) -> String {
        self.pool
            .lock()
            .expect("buffer pool poisoned")
            .pop()
            .unwrap_or_default()
    }

    /// Return a buffer to the pool. Oversized buffers are dropped so the
    /// pool cannot pin large allocations forever.
    pub fn release(&self, mut buf: String) {
        buf.clear();
        if buf.capacity() <= MAX_POOLED_CAPACITY {
            self.pool.lock().expect("buffer pool poisoned").push(buf);
        }
    }
}

/// A parsed SQL template: literal runs interleaved with `{name}`
/// placeholders.
#[derive(Debug)]
pub struct Template {
    name: &'static str,
    segments: Vec<Segment>,
}

#[derive(Debug)]
enum Segment {
    Lit(String),
    Var(String),
}

impl Template {
    /// Parse a template body. An unterminated `{` is a render failure.
    fn parse(name: &'static str, body: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut lit = String::new();
        let mut chars = body.chars();

        while let Some(c) = chars.next() {
            if c != '{' {
                lit.push(c);
                continue;
            }
            if !lit.is_empty() {
                segments.push(Segment::Lit(std::mem::take(&mut lit)));
            }
            let mut var = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var.push(c);
            }
            if !closed {
                return Err(DriftError::TemplateRender {
                    template: name.to_string(),
                    message: format!("unterminated placeholder {{{}", var),
                });
            }
            segments.push(Segment::Var(var));
        }
        if !lit.is_empty() {
            segments.push(Segment::Lit(lit));
        }

        Ok(Self { name, segments })
    }

    /// Template name (used in error context).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Render the template against a variable table. Every placeholder
    /// must be present; conditional sections are expressed by rendering a
    /// variable to the empty string.
    pub fn render(&self, vars: &[(&str, String)]) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Lit(s) => out.push_str(s),
                Segment::Var(v) => {
                    let value = vars
                        .iter()
                        .find(|(name, _)| *name == v.as_str())
                        .map(|(_, value)| value.as_str())
                        .ok_or_else(|| DriftError::TemplateRender {
                            template: self.name.to_string(),
                            message: format!("missing variable {{{}}}", v),
                        })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// Process-wide cache of parsed templates.
///
/// Insertion is idempotent and race-tolerant: two threads parsing the
/// same template concurrently is harmless and either insertion wins.
#[derive(Debug, Default)]
pub struct TemplateCache {
    inner: RwLock<HashMap<&'static str, Arc<Template>>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the parsed form of a template, parsing and caching it on
    /// first use.
    pub fn get(&self, name: &'static str, body: &str) -> Result<Arc<Template>> {
        if let Some(t) = self.inner.read().expect("template cache poisoned").get(name) {
            return Ok(t.clone());
        }
        let parsed = Arc::new(Template::parse(name, body)?);
        let mut map = self.inner.write().expect("template cache poisoned");
        Ok(map.entry(name).or_insert(parsed).clone())
    }
}

/// Injected bundle of the core's shared state.
#[derive(Debug)]
pub struct EngineContext {
    /// Dialect capability registry.
    pub drivers: DriverRegistry,
    /// Parsed introspection-query templates.
    pub templates: TemplateCache,
    /// Scratch buffers for SQL rendering.
    pub buffers: BufferPool,
}

impl EngineContext {
    /// Context with the four built-in drivers registered.
    pub fn new() -> Self {
        Self {
            drivers: DriverRegistry::with_builtins(),
            templates: TemplateCache::new(),
            buffers: BufferPool::new(),
        }
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_pool_reuses() {
        let pool = BufferPool::new();
        let mut buf = pool.acquire();
        buf.push_str("SELECT 1");
        pool.release(buf);

        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 8);
    }

    #[test]
    fn test_template_render() {
        let t = Template::parse("t", "SELECT * FROM {table} WHERE {cond}").unwrap();
        let sql = t
            .render(&[
                ("table", "users".to_string()),
                ("cond", "1 = 1".to_string()),
            ])
            .unwrap();
        assert_eq!(sql, "SELECT * FROM users WHERE 1 = 1");
    }

    #[test]
    fn test_template_missing_variable() {
        let t = Template::parse("t", "SELECT {a}").unwrap();
        assert!(t.render(&[]).is_err());
    }

    #[test]
    fn test_template_unterminated_placeholder() {
        assert!(Template::parse("t", "SELECT {a").is_err());
    }

    #[test]
    fn test_template_cache_idempotent() {
        let cache = TemplateCache::new();
        let a = cache.get("q", "SELECT {x}").unwrap();
        let b = cache.get("q", "SELECT {x}").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
