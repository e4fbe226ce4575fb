//! YAML scenarios: action groups plus a scripted excite/inhibit schedule.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use mind_action::{ActionGroup, ActionNode};
use mind_core::{Config, MindBuilder, SampleMode};
use serde::{Deserialize, Serialize};

/// A scenario file.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub seed: u64,

    #[serde(default = "default_ticks")]
    pub ticks: u64,

    #[serde(default)]
    pub sample: Sampling,

    /// Nested mapping, flattened into dotted config keys.
    #[serde(default)]
    pub config: serde_yaml::Value,

    #[serde(default)]
    pub groups: Vec<GroupSpec>,

    #[serde(default)]
    pub script: Vec<Step>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sampling {
    #[default]
    Uniform,
    Max,
}

impl From<Sampling> for SampleMode {
    fn from(sampling: Sampling) -> Self {
        match sampling {
            Sampling::Uniform => SampleMode::Uniform,
            Sampling::Max => SampleMode::Max,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupSpec {
    pub name: String,
    pub ticks: Option<u32>,
    pub actions: Vec<ActionSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionSpec {
    pub name: String,
    pub ticks: Option<u32>,
    pub key: Option<String>,
    pub value: Option<f32>,
}

/// Signals delivered just before `tick` runs, keyed by `group.action`.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub tick: u64,
    #[serde(default)]
    pub excite: BTreeMap<String, f32>,
    #[serde(default)]
    pub inhibit: BTreeMap<String, f32>,
}

fn default_name() -> String {
    "scenario".to_string()
}

fn default_ticks() -> u64 {
    10
}

/// One emitted action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRecord {
    pub tick: u64,
    pub action: String,
    pub key: String,
    pub value: f32,
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub scenario: String,
    pub seed: u64,
    pub ticks: u64,
    pub actions: Vec<ActionRecord>,
    /// `action` trace events as `(tick, path)`.
    pub selections: Vec<(u64, String)>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let scenario: Self = serde_yaml::from_str(yaml)?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<()> {
        if self.groups.is_empty() {
            bail!("scenario '{}' declares no action groups", self.name);
        }
        let paths: Vec<String> = self
            .groups
            .iter()
            .flat_map(|g| g.actions.iter().map(move |a| format!("{}.{}", g.name, a.name)))
            .collect();
        for step in &self.script {
            if step.tick == 0 {
                bail!("tick 0: script steps start at tick 1");
            }
            for path in step.excite.keys().chain(step.inhibit.keys()) {
                if !paths.contains(path) {
                    bail!("tick {}: unknown action '{}'", step.tick, path);
                }
            }
        }
        Ok(())
    }

    /// Builds the mind and replays the script for `ticks` ticks.
    pub fn run(&self, seed: u64, ticks: u64) -> Result<Report> {
        let mut config = Config::new();
        config.merge_value("", self.config.clone());

        let mut builder = MindBuilder::new(&self.name)
            .with_config(config)
            .with_seed(seed)
            .with_sample_mode(self.sample.into())
            .with_trace_log();
        let top = builder.top();

        let records = Rc::new(RefCell::new(Vec::new()));
        let mut nodes: BTreeMap<String, ActionNode> = BTreeMap::new();

        for spec in &self.groups {
            let group = ActionGroup::new(&mut builder, top, &spec.name)
                .with_context(|| format!("group '{}'", spec.name))?;
            if let Some(ticks) = spec.ticks {
                group.ticks(&mut builder, ticks)?;
            }
            for action in &spec.actions {
                let node = group
                    .action(&mut builder, &action.name)
                    .with_context(|| format!("action '{}.{}'", spec.name, action.name))?;
                if let Some(ticks) = action.ticks {
                    node.ticks(&mut builder, ticks)?;
                }
                if let Some(key) = &action.key {
                    node.key(&mut builder, key.as_str())?;
                }
                if let Some(value) = action.value {
                    node.value(&mut builder, value)?;
                }

                let (records, clock) = (Rc::clone(&records), builder.clock());
                let path = format!("{}.{}", spec.name, action.name);
                let action_path = path.clone();
                node.to(&mut builder, move |kv| {
                    records.borrow_mut().push(ActionRecord {
                        tick: clock.now(),
                        action: action_path.clone(),
                        key: kv.key.to_string(),
                        value: kv.value,
                    });
                    Ok(())
                })?;
                nodes.insert(path, node);
            }
        }

        let mut mind = builder.build().context("Failed to build mind")?;
        let nodes_built = mind.registry().len();
        tracing::info!(scenario = %self.name, seed, ticks, nodes = nodes_built, "Mind built");

        for tick in 1..=ticks {
            for step in self.script.iter().filter(|s| s.tick == tick) {
                for (path, value) in &step.excite {
                    signal(&nodes, path)?
                        .excite(*value)
                        .with_context(|| format!("tick {tick}: excite {path}"))?;
                }
                for (path, value) in &step.inhibit {
                    signal(&nodes, path)?
                        .inhibit(*value)
                        .with_context(|| format!("tick {tick}: inhibit {path}"))?;
                }
            }
            mind.tick().with_context(|| format!("tick {tick} failed"))?;
        }

        let selections = mind
            .take_trace_log()
            .map(|log| {
                log.tagged("action")
                    .map(|event| (event.tick, event.subject.clone()))
                    .collect()
            })
            .unwrap_or_default();
        let actions = records.borrow().clone();

        Ok(Report {
            scenario: self.name.clone(),
            seed,
            ticks,
            actions,
            selections,
        })
    }
}

fn signal<'a>(nodes: &'a BTreeMap<String, ActionNode>, path: &str) -> Result<&'a ActionNode> {
    nodes
        .get(path)
        .with_context(|| format!("unknown action '{path}'"))
}
