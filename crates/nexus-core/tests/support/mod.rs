#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use nexus_core::error::Result;
use nexus_core::instance::ApplicationInstance;
use nexus_core::node::{Node, NodeReport, NodeStrategy};
use nexus_core::package::zpk::ZPK_XML_NAMESPACE;
use nexus_core::target::DeployTarget;

/// Shared log of strategy calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Strategy returning a fixed report on every refresh.
#[derive(Debug, Clone)]
pub struct ScriptedStrategy {
    pub report: Option<NodeReport>,
    pub syncable: bool,
    pub fail_sync: bool,
    pub log: CallLog,
}

impl ScriptedStrategy {
    pub fn reporting(states: &[(&str, &str)]) -> Self {
        let mut report = NodeReport::new("ready");
        for (instance, state) in states {
            report = report.with_application_state(*instance, *state);
        }

        Self {
            report: Some(report),
            syncable: false,
            fail_sync: false,
            log: CallLog::default(),
        }
    }

    pub fn syncable(mut self) -> Self {
        self.syncable = true;
        self
    }

    pub fn failing_sync(mut self) -> Self {
        self.syncable = true;
        self.fail_sync = true;
        self
    }

    pub fn with_log(mut self, log: &CallLog) -> Self {
        self.log = log.clone();
        self
    }
}

impl NodeStrategy for ScriptedStrategy {
    fn type_id(&self) -> &str {
        "scripted"
    }

    fn set_entity(&mut self, node: &Node) {
        self.log.push(format!("set_entity:{}", node.node_type()));
    }

    fn attach(&mut self, target: &DeployTarget) -> Result<()> {
        self.log.push(format!("attach:{}", target.name()));
        Ok(())
    }

    fn detach(&mut self) -> Result<()> {
        self.log.push("detach");
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.log.push("sync");
        if self.fail_sync {
            return Err(anyhow::anyhow!("agent unreachable").into());
        }
        Ok(())
    }

    fn refresh(&mut self) -> Result<Option<NodeReport>> {
        self.log.push("refresh");
        Ok(self.report.clone())
    }

    fn rebuild(&mut self, instance: Option<&ApplicationInstance>) -> Result<()> {
        self.log
            .push(format!("rebuild:{}", instance.map(|i| i.id()).unwrap_or("*")));
        Ok(())
    }

    fn accepts_cluster_sibling(&self, node: &Node) -> bool {
        node.node_type() == "scripted"
    }

    fn can_sync(&self) -> bool {
        self.syncable
    }
}

/// Node of type `scripted` bound to the given strategy.
pub fn scripted_node(strategy: ScriptedStrategy) -> Node {
    let mut node = Node::new("scripted").unwrap();
    node.set_strategy(Box::new(strategy));
    node
}

pub fn composer_json(name: &str, version: &str) -> String {
    format!(
        r#"{{
    "name": "{}",
    "version": "{}",
    "require": {{ "php": ">=7.4", "ext-intl": "*" }},
    "extra": {{
        "branch-alias": {{ "dev-master": "2.x-dev" }},
        "deployment": {{
            "docroot": "public",
            "variables": {{ "APP_ENV": "prod", "WORKERS": 4 }},
            "parameters": {{
                "db_password": "password",
                "mode": {{
                    "type": "select",
                    "label": "Mode",
                    "default": "fast",
                    "required": true,
                    "valueOptions": ["fast", "safe"]
                }}
            }}
        }}
    }}
}}"#,
        name, version
    )
}

pub fn zpk_descriptor(name: &str, release: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package version="2.0" xmlns="{ns}">
    <type>application</type>
    <name>{name}</name>
    <summary>Demo application</summary>
    <version><release>{release}</release></version>
    <appdir>data</appdir>
    <docroot>data/public</docroot>
    <scriptsdir>scripts</scriptsdir>
    <dependencies>
        <required>
            <php><min>7.1</min><max>8.3.99</max></php>
            <extension><name>PDO</name></extension>
        </required>
    </dependencies>
    <parameters>
        <parameter id="db_host" display="Database host" type="hostname" required="true">
            <defaultvalue>localhost</defaultvalue>
        </parameter>
        <parameter id="cache" display="Cache backend" type="choice" readonly="true">
            <defaultvalue>redis</defaultvalue>
            <validation>
                <enums>
                    <enum>redis</enum>
                    <enum>memcached</enum>
                </enums>
            </validation>
        </parameter>
    </parameters>
    <variables>
        <variable name="APP_ENV" value="production" />
        <variable name="DEBUG" value="0" />
    </variables>
</package>"#,
        ns = ZPK_XML_NAMESPACE,
        name = name,
        release = release
    )
}

/// Build an in-memory zip with the given entries.
pub fn build_zip(files: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, content) in files {
            zip.start_file(*name, options).expect("Failed to start zip entry");
            zip.write_all(content.as_bytes())
                .expect("Failed to write zip entry");
        }
        zip.finish().expect("Failed to finish zip");
    }
    buf
}
