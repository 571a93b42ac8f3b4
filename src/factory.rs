use std::collections::BTreeMap;

use anyhow::{bail, Result};

/// Maps the type tags used in scenario data to constructors.
pub struct Registry<T> {
    /// What the registry builds, for error messages ("game object", "condition", ...).
    what: &'static str,
    entries: BTreeMap<String, T>,
}

impl<T> Registry<T> {
    pub fn new(what: &'static str) -> Self {
        Self {
            what,
            entries: BTreeMap::new(),
        }
    }

    /// Register a constructor. Registering the same tag twice is an error.
    pub fn register(&mut self, tag: &str, ctor: T) -> Result<()> {
        if self.entries.contains_key(tag) {
            bail!("Duplicate {} implementation for \"{}\"", self.what, tag);
        }
        self.entries.insert(tag.to_owned(), ctor);
        Ok(())
    }

    pub fn get(&self, tag: &str) -> Result<&T> {
        match self.entries.get(tag) {
            Some(ctor) => Ok(ctor),
            None => bail!("No implementation for {} \"{}\"", self.what, tag),
        }
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_and_duplicates() {
        let mut reg: Registry<fn(i32) -> i32> = Registry::new("doubler");
        reg.register("Double", |x| x * 2).unwrap();
        assert_eq!((reg.get("Double").unwrap())(4), 8);

        let err = reg.register("Double", |x| x).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));

        let err = reg.get("Triple").err().unwrap();
        assert_eq!(err.to_string(), "No implementation for doubler \"Triple\"");
        assert_eq!(reg.tags().collect::<Vec<_>>(), vec!["Double"]);
    }
}
