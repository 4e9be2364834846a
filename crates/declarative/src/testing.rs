//! In-memory provider used by the engine's own tests

use crate::context::ProviderContext;
use crate::error::FindError;
use crate::task::{BoxedTask, Resource, Task, TaskKey, TaskRef};
use anyhow::bail;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// Fake cloud: a name -> value store plus injected failures
#[derive(Debug, Default)]
pub struct FakeCloud {
    pub existing: Mutex<BTreeMap<String, u32>>,
    pub fail_render: BTreeSet<String>,
    pub fail_find: BTreeSet<String>,
    pub deny_find: BTreeSet<String>,
    /// "find:<name>" / "render:<name>" in call order
    pub calls: Mutex<Vec<String>>,
}

impl FakeCloud {
    pub fn with_existing(entries: &[(&str, u32)]) -> Self {
        Self {
            existing: Mutex::new(entries.iter().map(|(n, v)| ((*n).to_string(), *v)).collect()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

/// Resource whose state is a single number
#[derive(Debug, Clone, PartialEq)]
pub struct Dummy {
    pub deps: Vec<TaskRef<Dummy>>,
    pub value: u32,
}

impl Dummy {
    pub fn task(name: &str, deps: &[&str]) -> BoxedTask<FakeCloud> {
        Self::valued(name, deps, 1).boxed()
    }

    pub fn valued(name: &str, deps: &[&str], value: u32) -> Task<Self> {
        Task::new(
            name,
            Self {
                deps: deps.iter().map(|d| TaskRef::new(*d)).collect(),
                value,
            },
        )
    }
}

impl Resource for Dummy {
    type Cloud = FakeCloud;
    const KIND: &'static str = "Dummy";

    fn references(&self) -> Vec<TaskKey> {
        self.deps.iter().map(TaskRef::key).collect()
    }

    fn find(&self, name: &str, ctx: &ProviderContext<FakeCloud>) -> Result<Option<Self>, FindError> {
        let cloud = ctx.cloud();
        cloud.log(format!("find:{name}"));
        if cloud.deny_find.contains(name) {
            return Err(FindError::AccessDenied(format!("not allowed to read {name}")));
        }
        if cloud.fail_find.contains(name) {
            return Err(FindError::Other(anyhow::anyhow!("lookup of {name} timed out")));
        }
        let existing = cloud.existing.lock().unwrap();
        Ok(existing.get(name).map(|value| Self {
            deps: self.deps.clone(),
            value: *value,
        }))
    }

    fn render(
        &self,
        name: &str,
        actual: Option<&Self>,
        ctx: &ProviderContext<FakeCloud>,
        dry_run: bool,
    ) -> anyhow::Result<bool> {
        let cloud = ctx.cloud();
        if actual == Some(self) {
            return Ok(false);
        }
        if dry_run {
            return Ok(true);
        }
        cloud.log(format!("render:{name}"));
        if cloud.fail_render.contains(name) {
            bail!("provider rejected {name}");
        }
        cloud
            .existing
            .lock()
            .unwrap()
            .insert(name.to_string(), self.value);
        Ok(true)
    }
}
