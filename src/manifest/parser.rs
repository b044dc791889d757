//! `ModuleConfig.xml` interpretation.
//!
//! The parser walks the element tree produced by [`super::xml`] and builds the
//! [`ModuleConfig`] model. Any structurally required element or attribute that
//! is missing aborts the load with [`FomodError::ManifestParse`]; no partial
//! model is ever returned.
//!
//! # Declaration order
//!
//! Every `<file>`/`<folder>` element receives a sequence number in document
//! order before any presentation sorting happens, so the merge tie-break is
//! independent of the `order` attributes.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use super::metadata::{GuessQuality, ModMetadata};
use super::xml::{self, XmlElement};
use super::{
    ConditionalInstall, DependencyPattern, FileDescriptor, Group, InstallStep, ModuleConfig,
    Plugin, PluginTypeInfo,
};
use crate::condition::{Condition, ConditionFlag, SubCondition};
use crate::error::{FomodError, Result};
use crate::types::{ConditionOperator, FileState, GroupType, ItemOrder, PluginType, VersionKind};

const MODULE_CONFIG: &str = "ModuleConfig.xml";
const INFO: &str = "info.xml";

/// A loaded package: metadata plus install script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub metadata: ModMetadata,
    pub config: ModuleConfig,
}

impl Manifest {
    /// Build a manifest from raw document bytes.
    ///
    /// `moduleName` seeds the display name as a fallback guess; the `Name`
    /// element of `info.xml` replaces it.
    pub fn parse(info: Option<&[u8]>, module_config: &[u8]) -> Result<Self> {
        let config = parse_module_config(module_config)?;

        let mut metadata = ModMetadata::default();
        metadata
            .name
            .update(config.module_name.clone(), GuessQuality::Fallback);
        if let Some(info) = info {
            metadata.read_info(info)?;
        }

        debug!(
            "Loaded manifest '{}' with {} step(s) and {} plugin(s)",
            metadata.display_name(),
            config.steps.len(),
            config.plugin_count()
        );
        Ok(Self { metadata, config })
    }

    /// Load `info.xml` (optional) and `ModuleConfig.xml` from a `fomod` directory.
    /// File names are matched case-insensitively.
    pub fn load(fomod_dir: &Path) -> Result<Self> {
        let module_config_path = find_file(fomod_dir, MODULE_CONFIG)?.ok_or_else(|| {
            FomodError::parse(
                MODULE_CONFIG,
                format!("not found in {}", fomod_dir.display()),
            )
        })?;
        let module_config = fs::read(&module_config_path)?;

        let info = match find_file(fomod_dir, INFO)? {
            Some(path) => Some(fs::read(path)?),
            None => None,
        };

        Self::parse(info.as_deref(), &module_config)
    }
}

fn find_file(dir: &Path, name: &str) -> Result<Option<PathBuf>> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file()
            && entry.file_name().to_string_lossy().eq_ignore_ascii_case(name)
        {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

/// Parse the bytes of a `ModuleConfig.xml` document
pub fn parse_module_config(bytes: &[u8]) -> Result<ModuleConfig> {
    let root = xml::parse_document(MODULE_CONFIG, bytes)?;
    ConfigParser::default().parse(&root)
}

/// Parser state: the running declaration sequence
#[derive(Default)]
struct ConfigParser {
    sequence: usize,
}

impl ConfigParser {
    fn parse(&mut self, root: &XmlElement) -> Result<ModuleConfig> {
        let module_name = root
            .require_child(MODULE_CONFIG, "moduleName")?
            .text
            .clone();

        let mut config = ModuleConfig {
            module_name,
            ..Default::default()
        };

        // Walk sections in document order so sequence numbers follow the file
        for section in &root.children {
            match section.name.as_str() {
                "moduleName" => {}
                "moduleImage" => {
                    config.module_image = section.attr("path").map(normalize_path);
                }
                "moduleDependencies" => {
                    config.seed_flags = section
                        .children_named("flag")
                        .map(parse_flag)
                        .collect::<Result<_>>()?;
                    config.dependencies = Some(parse_composite(section)?);
                }
                "requiredInstallFiles" => {
                    config.required_files = self.parse_file_list(section)?;
                }
                "installSteps" => {
                    config.steps = self.parse_steps(section)?;
                }
                "conditionalFileInstalls" => {
                    config.conditional_installs = self.parse_conditional_installs(section)?;
                }
                other => debug!("Ignoring unknown section <{}>", other),
            }
        }

        Ok(config)
    }

    fn parse_steps(&mut self, element: &XmlElement) -> Result<Vec<InstallStep>> {
        let order = parse_order(element)?;
        let mut steps = element
            .children_named("installStep")
            .map(|step| self.parse_step(step))
            .collect::<Result<Vec<_>>>()?;
        sort_by_name(&mut steps, order, |step| &step.name);
        Ok(steps)
    }

    fn parse_step(&mut self, element: &XmlElement) -> Result<InstallStep> {
        let name = element.require_attr(MODULE_CONFIG, "name")?.to_string();
        let visible = element.child("visible").map(parse_composite).transpose()?;

        let groups = match element.child("optionalFileGroups") {
            Some(container) => {
                let order = parse_order(container)?;
                let mut groups = container
                    .children_named("group")
                    .map(|group| self.parse_group(group))
                    .collect::<Result<Vec<_>>>()?;
                sort_by_name(&mut groups, order, |group| &group.name);
                groups
            }
            None => Vec::new(),
        };

        Ok(InstallStep {
            name,
            visible,
            groups,
        })
    }

    fn parse_group(&mut self, element: &XmlElement) -> Result<Group> {
        let name = element.require_attr(MODULE_CONFIG, "name")?.to_string();
        let group_type = match element.attr("type") {
            Some(value) => parse_enum::<GroupType>("type", value)?,
            None => GroupType::default(),
        };

        let plugins = match element.child("plugins") {
            Some(container) => {
                let order = parse_order(container)?;
                let mut plugins = container
                    .children_named("plugin")
                    .map(|plugin| self.parse_plugin(plugin))
                    .collect::<Result<Vec<_>>>()?;
                sort_by_name(&mut plugins, order, |plugin| &plugin.name);
                plugins
            }
            None => Vec::new(),
        };

        Ok(Group {
            name,
            group_type,
            plugins,
        })
    }

    fn parse_plugin(&mut self, element: &XmlElement) -> Result<Plugin> {
        let name = element.require_attr(MODULE_CONFIG, "name")?.to_string();

        let files = match element.child("files") {
            Some(files) => self.parse_file_list(files)?,
            None => Vec::new(),
        };
        let condition_flags = match element.child("conditionFlags") {
            Some(flags) => flags
                .children_named("flag")
                .map(parse_flag)
                .collect::<Result<_>>()?,
            None => Vec::new(),
        };
        let type_info = match element.child("typeDescriptor") {
            Some(descriptor) => parse_type_descriptor(descriptor)?,
            None => PluginTypeInfo::default(),
        };

        Ok(Plugin {
            name,
            description: element.child_text("description").unwrap_or_default().to_string(),
            image_path: element
                .child("image")
                .and_then(|image| image.attr("path"))
                .map(normalize_path),
            type_info,
            condition_flags,
            files,
        })
    }

    fn parse_conditional_installs(&mut self, element: &XmlElement) -> Result<Vec<ConditionalInstall>> {
        let Some(patterns) = element.child("patterns") else {
            return Ok(Vec::new());
        };

        patterns
            .children_named("pattern")
            .map(|pattern| {
                let condition = parse_composite(pattern.require_child(MODULE_CONFIG, "dependencies")?)?;
                let files = match pattern.child("files") {
                    Some(files) => self.parse_file_list(files)?,
                    None => Vec::new(),
                };
                Ok(ConditionalInstall { condition, files })
            })
            .collect()
    }

    fn parse_file_list(&mut self, element: &XmlElement) -> Result<Vec<FileDescriptor>> {
        element
            .children
            .iter()
            .filter(|child| child.name == "file" || child.name == "folder")
            .map(|child| self.parse_file(child))
            .collect()
    }

    fn parse_file(&mut self, element: &XmlElement) -> Result<FileDescriptor> {
        let source = normalize_path(element.require_attr(MODULE_CONFIG, "source")?);
        // A missing destination mirrors the source; an empty one means the root
        let destination = match element.attr("destination") {
            Some(destination) => normalize_path(destination),
            None => source.clone(),
        };
        let priority = match element.attr("priority") {
            Some(value) => value.trim().parse().unwrap_or_else(|_| {
                warn!("Invalid priority '{}' for '{}', using 0", value, source);
                0
            }),
            None => 0,
        };

        let sequence = self.sequence;
        self.sequence += 1;

        Ok(FileDescriptor {
            source,
            destination,
            priority,
            is_folder: element.name == "folder",
            always_install: parse_bool(element.attr("alwaysInstall")),
            install_if_usable: parse_bool(element.attr("installIfUsable")),
            sequence,
        })
    }
}

fn parse_type_descriptor(element: &XmlElement) -> Result<PluginTypeInfo> {
    if let Some(fixed) = element.child("type") {
        let plugin_type = parse_enum(
            "type",
            fixed.require_attr(MODULE_CONFIG, "name")?,
        )?;
        return Ok(PluginTypeInfo::fixed(plugin_type));
    }

    let dependency_type = element.require_child(MODULE_CONFIG, "dependencyType")?;
    let default_type = parse_enum(
        "defaultType",
        dependency_type
            .require_child(MODULE_CONFIG, "defaultType")?
            .require_attr(MODULE_CONFIG, "name")?,
    )?;

    let patterns = match dependency_type.child("patterns") {
        Some(patterns) => patterns
            .children_named("pattern")
            .map(|pattern| {
                let condition =
                    parse_composite(pattern.require_child(MODULE_CONFIG, "dependencies")?)?;
                let plugin_type = parse_enum::<PluginType>(
                    "type",
                    pattern
                        .require_child(MODULE_CONFIG, "type")?
                        .require_attr(MODULE_CONFIG, "name")?,
                )?;
                Ok(DependencyPattern {
                    plugin_type,
                    condition,
                })
            })
            .collect::<Result<_>>()?,
        None => Vec::new(),
    };

    Ok(PluginTypeInfo {
        default_type,
        patterns,
    })
}

/// Parse a composite dependency element (`dependencies`, `visible`,
/// `moduleDependencies`). Plain `<flag>` children are seed flags, not
/// conditions, and are skipped here.
fn parse_composite(element: &XmlElement) -> Result<SubCondition> {
    let operator = match element.attr("operator") {
        Some(value) => parse_enum::<ConditionOperator>("operator", value)?,
        None => ConditionOperator::default(),
    };

    let mut conditions = Vec::new();
    for child in &element.children {
        let condition = match child.name.as_str() {
            "fileDependency" => Condition::file(
                normalize_path(child.require_attr(MODULE_CONFIG, "file")?),
                parse_enum::<FileState>("state", child.require_attr(MODULE_CONFIG, "state")?)?,
            ),
            "flagDependency" => Condition::flag(
                child.require_attr(MODULE_CONFIG, "flag")?,
                child.attr("value").unwrap_or_default(),
            ),
            "dependencies" => Condition::Sub(parse_composite(child)?),
            "flag" => continue,
            name => match VersionKind::from_element(name) {
                Some(kind) => Condition::version(kind, child.require_attr(MODULE_CONFIG, "version")?),
                None => {
                    debug!("Ignoring unknown dependency <{}>", name);
                    continue;
                }
            },
        };
        conditions.push(condition);
    }

    Ok(SubCondition::new(operator, conditions))
}

fn parse_flag(element: &XmlElement) -> Result<ConditionFlag> {
    Ok(ConditionFlag::new(
        element.require_attr(MODULE_CONFIG, "name")?,
        element.text.clone(),
    ))
}

fn parse_order(element: &XmlElement) -> Result<ItemOrder> {
    match element.attr("order") {
        Some(value) => parse_enum("order", value),
        None => Ok(ItemOrder::default()),
    }
}

fn parse_enum<T: FromStr>(attribute: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        FomodError::parse(
            MODULE_CONFIG,
            format!("invalid value '{}' for '{}'", value, attribute),
        )
    })
}

fn parse_bool(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some(v) if v.eq_ignore_ascii_case("true") || v == "1")
}

/// Forward slashes, no leading, trailing or doubled separators
pub fn normalize_path(path: &str) -> String {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn sort_by_name<T>(items: &mut [T], order: ItemOrder, name: impl Fn(&T) -> &str) {
    let compare = |a: &T, b: &T| -> Ordering {
        name(a)
            .to_lowercase()
            .cmp(&name(b).to_lowercase())
    };
    match order {
        ItemOrder::Ascending => items.sort_by(compare),
        ItemOrder::Descending => items.sort_by(|a, b| compare(b, a)),
        ItemOrder::Explicit => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<config xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
    <moduleName>Sky Retexture</moduleName>
    <moduleImage path="fomod\images\cover.png"/>
    <moduleDependencies operator="And">
        <fileDependency file="core.esm" state="Active"/>
        <flag name="Seeded">yes</flag>
    </moduleDependencies>
    <requiredInstallFiles>
        <file source="core\readme.txt" destination="docs/readme.txt"/>
        <folder source="core/textures" destination="textures" priority="-1"/>
    </requiredInstallFiles>
    <installSteps order="Explicit">
        <installStep name="Resolution">
            <optionalFileGroups>
                <group name="Size" type="SelectExactlyOne">
                    <plugins order="Explicit">
                        <plugin name="4K">
                            <description>Large textures</description>
                            <image path="fomod/4k.png"/>
                            <files>
                                <folder source="4k" destination="" priority="2"/>
                            </files>
                            <conditionFlags>
                                <flag name="Res">4K</flag>
                            </conditionFlags>
                            <typeDescriptor><type name="Recommended"/></typeDescriptor>
                        </plugin>
                        <plugin name="2K">
                            <description>Small textures</description>
                            <conditionFlags>
                                <flag name="Res">2K</flag>
                            </conditionFlags>
                            <typeDescriptor>
                                <dependencyType>
                                    <defaultType name="Optional"/>
                                    <patterns>
                                        <pattern>
                                            <dependencies operator="Or">
                                                <fileDependency file="lowres.esp" state="Active"/>
                                                <gameDependency version="1.5"/>
                                            </dependencies>
                                            <type name="Required"/>
                                        </pattern>
                                    </patterns>
                                </dependencyType>
                            </typeDescriptor>
                        </plugin>
                    </plugins>
                </group>
            </optionalFileGroups>
        </installStep>
        <installStep name="Extras">
            <visible>
                <flagDependency flag="Res" value="4K"/>
            </visible>
            <optionalFileGroups>
                <group name="Sky">
                    <plugins>
                        <plugin name="Clouds">
                            <description/>
                            <files><file source="clouds.dds" alwaysInstall="true"/></files>
                            <typeDescriptor><type name="Optional"/></typeDescriptor>
                        </plugin>
                    </plugins>
                </group>
            </optionalFileGroups>
        </installStep>
    </installSteps>
    <conditionalFileInstalls>
        <patterns>
            <pattern>
                <dependencies>
                    <flagDependency flag="Res" value="4K"/>
                </dependencies>
                <files><file source="extra.bsa" destination="extra.bsa"/></files>
            </pattern>
        </patterns>
    </conditionalFileInstalls>
</config>"#;

    #[test]
    fn test_parse_full_manifest() {
        let config = parse_module_config(FULL.as_bytes()).unwrap();

        assert_eq!(config.module_name, "Sky Retexture");
        assert_eq!(config.module_image.as_deref(), Some("fomod/images/cover.png"));
        assert_eq!(config.seed_flags, vec![ConditionFlag::new("Seeded", "yes")]);
        assert_eq!(config.dependencies.as_ref().map(|d| d.conditions.len()), Some(1));

        assert_eq!(config.required_files.len(), 2);
        assert_eq!(config.required_files[0].source, "core/readme.txt");
        assert_eq!(config.required_files[0].destination, "docs/readme.txt");
        assert!(config.required_files[1].is_folder);
        assert_eq!(config.required_files[1].priority, -1);

        assert_eq!(config.steps.len(), 2);
        assert_eq!(config.steps[0].name, "Resolution");
        let group = &config.steps[0].groups[0];
        assert_eq!(group.group_type, GroupType::SelectExactlyOne);
        assert_eq!(group.plugins[0].name, "4K");
        assert_eq!(group.plugins[0].image_path.as_deref(), Some("fomod/4k.png"));
        assert_eq!(group.plugins[0].type_info.default_type, PluginType::Recommended);
        assert_eq!(group.plugins[0].files[0].destination, "");

        let dynamic = &group.plugins[1].type_info;
        assert_eq!(dynamic.default_type, PluginType::Optional);
        assert_eq!(dynamic.patterns.len(), 1);
        assert_eq!(dynamic.patterns[0].plugin_type, PluginType::Required);
        assert_eq!(dynamic.patterns[0].condition.operator, ConditionOperator::Or);
        assert_eq!(
            dynamic.patterns[0].condition.conditions[1],
            Condition::version(VersionKind::Game, "1.5")
        );

        let extras = &config.steps[1];
        assert!(extras.visible.is_some());
        assert_eq!(extras.groups[0].group_type, GroupType::SelectAny);
        let clouds = &extras.groups[0].plugins[0].files[0];
        assert!(clouds.always_install);
        assert_eq!(clouds.destination, "clouds.dds");

        assert_eq!(config.conditional_installs.len(), 1);
        assert_eq!(config.conditional_installs[0].files[0].source, "extra.bsa");
    }

    #[test]
    fn test_sequence_follows_document_order() {
        let config = parse_module_config(FULL.as_bytes()).unwrap();
        let sequences: Vec<_> = config
            .all_descriptors()
            .iter()
            .map(|d| (d.source.clone(), d.sequence))
            .collect();
        assert_eq!(
            sequences,
            vec![
                ("core/readme.txt".to_string(), 0),
                ("core/textures".to_string(), 1),
                ("4k".to_string(), 2),
                ("clouds.dds".to_string(), 3),
                ("extra.bsa".to_string(), 4),
            ]
        );
    }

    #[test]
    fn test_default_order_sorts_by_name() {
        let xml = r#"<config><moduleName>M</moduleName><installSteps>
            <installStep name="b"><optionalFileGroups order="Descending">
                <group name="g1" type="SelectAny"><plugins>
                    <plugin name="Zeta"><description/><typeDescriptor><type name="Optional"/></typeDescriptor></plugin>
                    <plugin name="alpha"><description/><typeDescriptor><type name="Optional"/></typeDescriptor></plugin>
                </plugins></group>
                <group name="g2" type="SelectAny"><plugins/></group>
            </optionalFileGroups></installStep>
            <installStep name="a"/>
        </installSteps></config>"#;
        let config = parse_module_config(xml.as_bytes()).unwrap();

        let steps: Vec<_> = config.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(steps, vec!["a", "b"]);
        let groups: Vec<_> = config.steps[1].groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(groups, vec!["g2", "g1"]);
        let plugins: Vec<_> = config.steps[1].groups[1]
            .plugins
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(plugins, vec!["alpha", "Zeta"]);
    }

    #[test]
    fn test_missing_module_name_is_error() {
        let err = parse_module_config(b"<config><installSteps/></config>").unwrap_err();
        assert!(matches!(err, FomodError::ManifestParse { .. }));
        assert!(err.to_string().contains("moduleName"));
    }

    #[test]
    fn test_missing_file_source_is_error() {
        let xml = r#"<config><moduleName>M</moduleName>
            <requiredInstallFiles><file destination="x"/></requiredInstallFiles></config>"#;
        let err = parse_module_config(xml.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("source"));
    }

    #[test]
    fn test_invalid_enum_value_is_error() {
        let xml = r#"<config><moduleName>M</moduleName><installSteps><installStep name="s">
            <optionalFileGroups><group name="g" type="SelectSome"/></optionalFileGroups>
        </installStep></installSteps></config>"#;
        assert!(parse_module_config(xml.as_bytes()).is_err());
    }

    #[test]
    fn test_manifest_name_guessing() {
        let manifest = Manifest::parse(None, FULL.as_bytes()).unwrap();
        assert_eq!(manifest.metadata.display_name(), "Sky Retexture");
        assert_eq!(manifest.metadata.name.quality(), GuessQuality::Fallback);

        let manifest = Manifest::parse(
            Some(b"<fomod><Name>Better Skies</Name><Version>2.0</Version></fomod>"),
            FULL.as_bytes(),
        )
        .unwrap();
        assert_eq!(manifest.metadata.display_name(), "Better Skies");
        assert_eq!(manifest.metadata.version, "2.0");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("\\textures\\sky\\"), "textures/sky");
        assert_eq!(normalize_path("./a//b"), "a/b");
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn test_load_from_directory_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("moduleconfig.XML"), FULL).unwrap();
        fs::write(dir.path().join("Info.xml"), "<fomod><Name>From Info</Name></fomod>").unwrap();

        let manifest = Manifest::load(dir.path()).unwrap();
        assert_eq!(manifest.metadata.display_name(), "From Info");
        assert_eq!(manifest.config.steps.len(), 2);
    }

    #[test]
    fn test_load_without_module_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = Manifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, FomodError::ManifestParse { .. }));
    }
}
