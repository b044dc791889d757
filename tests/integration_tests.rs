//! End-to-end tests for the installer engine
//!
//! These tests verify:
//! - Manifest parsing through to the merged destination tree
//! - Radio group selection and priority-based overwrites
//! - Conditional installs driven by condition flags
//! - Plugin types derived from the host's plugin list

use fomod_engine::condition::{self, Condition, FlagState};
use fomod_engine::{
    DirectoryTree, FactSheet, FileState, FomodError, FomodInstaller, GroupChoice, InstallChoices,
    InstallOutcome, InstallWizard, Package, PluginType, StepChoice, WizardState,
    parse_module_config,
};

fn choose(step: &str, group: &str, plugins: &[&str]) -> InstallChoices {
    InstallChoices {
        steps: vec![StepChoice {
            name: step.to_string(),
            groups: vec![GroupChoice {
                name: group.to_string(),
                plugins: plugins.iter().map(|p| p.to_string()).collect(),
            }],
        }],
        ..Default::default()
    }
}

fn install(package: Package, facts: &FactSheet, choices: &InstallChoices) -> DirectoryTree {
    match FomodInstaller::default().install(package, facts, choices).unwrap() {
        InstallOutcome::Success(report) => report.tree,
        other => panic!("expected a successful install, got {:?}", other),
    }
}

// =============================================================================
// Radio Group Overwrites
// =============================================================================

const RADIO_CONFIG: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<config>
    <moduleName>Radio</moduleName>
    <installSteps order="Explicit">
        <installStep name="Main">
            <optionalFileGroups>
                <group name="Choice" type="SelectExactlyOne">
                    <plugins order="Explicit">
                        <plugin name="A">
                            <description>Plain</description>
                            <files><file source="a.esp" destination="a.esp" priority="0"/></files>
                            <typeDescriptor><type name="Optional"/></typeDescriptor>
                        </plugin>
                        <plugin name="B">
                            <description>Replacement</description>
                            <files><file source="b.esp" destination="a.esp" priority="5"/></files>
                            <typeDescriptor><type name="Optional"/></typeDescriptor>
                        </plugin>
                    </plugins>
                </group>
            </optionalFileGroups>
        </installStep>
    </installSteps>
</config>"#;

fn radio_package() -> Package {
    let tree = DirectoryTree::from_paths(["fomod/ModuleConfig.xml", "a.esp", "b.esp"]).unwrap();
    Package::from_listing(tree, None, RADIO_CONFIG.as_bytes()).unwrap()
}

#[test]
fn test_radio_selection_picks_source() {
    let facts = FactSheet::new();

    let report = match FomodInstaller::default()
        .install(radio_package(), &facts, &choose("Main", "Choice", &["B"]))
        .unwrap()
    {
        InstallOutcome::Success(report) => report,
        other => panic!("expected a successful install, got {:?}", other),
    };
    assert_eq!(report.tree.file("a.esp").unwrap().source, "b.esp");
    assert_eq!(report.tree.file_count(), 1);
    assert!(report.overwrites.is_empty(), "only the selected plugin installs");

    let tree = install(radio_package(), &facts, &choose("Main", "Choice", &["A"]));
    assert_eq!(tree.file("a.esp").unwrap().source, "a.esp");
}

#[test]
fn test_radio_default_is_first_usable() {
    let facts = FactSheet::new();
    let tree = install(radio_package(), &facts, &InstallChoices::new());
    assert_eq!(tree.file("a.esp").unwrap().source, "a.esp");
}

#[test]
fn test_radio_toggle_switches_choice() {
    let config = parse_module_config(RADIO_CONFIG.as_bytes()).unwrap();
    let facts = FactSheet::new();
    let mut wizard = InstallWizard::new(&config, &facts);

    assert!(wizard.is_selected(0, 0, 0));
    wizard.toggle(0, 1, true).unwrap();
    assert!(!wizard.is_selected(0, 0, 0));
    assert!(wizard.is_selected(0, 0, 1));

    // The last choice of an exactly-one group cannot be cleared
    assert!(wizard.toggle(0, 1, false).is_err());
    assert_eq!(wizard.next().unwrap(), WizardState::Finished);
}

// =============================================================================
// Conditional Installs
// =============================================================================

const STAGED_CONFIG: &str = r#"<config>
    <moduleName>Staged</moduleName>
    <requiredInstallFiles>
        <folder source="core" destination=""/>
    </requiredInstallFiles>
    <installSteps>
        <installStep name="Stage">
            <optionalFileGroups>
                <group name="Level" type="SelectExactlyOne">
                    <plugins>
                        <plugin name="One">
                            <description/>
                            <conditionFlags><flag name="Stage">1</flag></conditionFlags>
                            <typeDescriptor><type name="Optional"/></typeDescriptor>
                        </plugin>
                        <plugin name="Two">
                            <description/>
                            <conditionFlags><flag name="Stage">2</flag></conditionFlags>
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
                <dependencies operator="And">
                    <flagDependency flag="Stage" value="2"/>
                </dependencies>
                <files><file source="optional/extra.bsa" destination="extra.bsa"/></files>
            </pattern>
        </patterns>
    </conditionalFileInstalls>
</config>"#;

fn staged_package() -> Package {
    let tree = DirectoryTree::from_paths([
        "Staged/fomod/ModuleConfig.xml",
        "Staged/core/staged.esp",
        "Staged/core/meshes/rock.nif",
        "Staged/optional/extra.bsa",
    ])
    .unwrap();
    Package::from_listing(tree, None, STAGED_CONFIG.as_bytes()).unwrap()
}

#[test]
fn test_conditional_install_follows_flag() {
    let facts = FactSheet::new();

    let tree = install(staged_package(), &facts, &choose("Stage", "Level", &["Two"]));
    assert_eq!(tree.file("extra.bsa").unwrap().source, "optional/extra.bsa");
    assert_eq!(tree.file("staged.esp").unwrap().source, "core/staged.esp");
    assert_eq!(tree.file("meshes/rock.nif").unwrap().source, "core/meshes/rock.nif");

    let tree = install(staged_package(), &facts, &choose("Stage", "Level", &["One"]));
    assert!(tree.file("extra.bsa").is_none());
    assert_eq!(tree.file_count(), 2);
}

#[test]
fn test_choices_roundtrip_through_report() {
    let facts = FactSheet::new();
    let wanted = choose("Stage", "Level", &["Two"]);

    let InstallOutcome::Success(report) = FomodInstaller::default()
        .install(staged_package(), &facts, &wanted)
        .unwrap()
    else {
        panic!("expected a successful install");
    };
    assert_eq!(report.choices, wanted);
    assert_eq!(report.metadata.display_name(), "Staged");
}

// =============================================================================
// Host-Dependent Plugin Types
// =============================================================================

const PATCH_CONFIG: &str = r#"<config>
    <moduleName>Patches</moduleName>
    <installSteps>
        <installStep name="Patches">
            <optionalFileGroups>
                <group name="Compatibility" type="SelectAny">
                    <plugins>
                        <plugin name="Core Patch">
                            <description>Needs core.esm</description>
                            <files><file source="patch.esp" destination="patch.esp"/></files>
                            <typeDescriptor>
                                <dependencyType>
                                    <defaultType name="NotUsable"/>
                                    <patterns>
                                        <pattern>
                                            <dependencies>
                                                <fileDependency file="core.esm" state="Active"/>
                                            </dependencies>
                                            <type name="Recommended"/>
                                        </pattern>
                                    </patterns>
                                </dependencyType>
                            </typeDescriptor>
                        </plugin>
                    </plugins>
                </group>
            </optionalFileGroups>
        </installStep>
    </installSteps>
</config>"#;

#[test]
fn test_file_condition_distinguishes_missing_and_active() {
    let flags = FlagState::new();
    let missing = Condition::file("core.esm", FileState::Missing);
    let active = Condition::file("core.esm", FileState::Active);

    let empty = FactSheet::new();
    assert!(condition::evaluate(&missing, &flags, &empty));
    assert!(!condition::evaluate(&active, &flags, &empty));

    let mut host = FactSheet::new();
    host.active_plugins.push("Core.esm".to_string());
    assert!(!condition::evaluate(&missing, &flags, &host));
    assert!(condition::evaluate(&active, &flags, &host));
}

#[test]
fn test_not_usable_plugin_cannot_be_selected() {
    let config = parse_module_config(PATCH_CONFIG.as_bytes()).unwrap();
    let facts = FactSheet::new();
    let mut wizard = InstallWizard::new(&config, &facts);

    assert_eq!(wizard.plugin_type(0, 0, 0), PluginType::NotUsable);
    assert!(!wizard.is_selected(0, 0, 0));

    let err = wizard.toggle(0, 0, true).unwrap_err();
    assert!(matches!(err, FomodError::SelectionRejected { ref plugin, .. } if plugin == "Core Patch"));
    assert!(!wizard.is_selected(0, 0, 0));

    let view = wizard.page_view().unwrap();
    assert!(!view.groups[0].plugins[0].enabled);
}

#[test]
fn test_recommended_plugin_preselected_when_host_has_master() {
    let config = parse_module_config(PATCH_CONFIG.as_bytes()).unwrap();
    let mut facts = FactSheet::new();
    facts.active_plugins.push("core.esm".to_string());
    let wizard = InstallWizard::new(&config, &facts);

    assert_eq!(wizard.plugin_type(0, 0, 0), PluginType::Recommended);
    assert!(wizard.is_selected(0, 0, 0));
}

// =============================================================================
// Page Visibility
// =============================================================================

const PAGED_CONFIG: &str = r#"<config>
    <moduleName>Paged</moduleName>
    <installSteps order="Explicit">
        <installStep name="Start">
            <optionalFileGroups>
                <group name="Extras" type="SelectAny">
                    <plugins>
                        <plugin name="Weather">
                            <description/>
                            <conditionFlags><flag name="weather">on</flag></conditionFlags>
                            <typeDescriptor><type name="Optional"/></typeDescriptor>
                        </plugin>
                    </plugins>
                </group>
            </optionalFileGroups>
        </installStep>
        <installStep name="Weather Options">
            <visible><flagDependency flag="weather" value="on"/></visible>
            <optionalFileGroups>
                <group name="Rain" type="SelectAny">
                    <plugins>
                        <plugin name="Heavy">
                            <description/>
                            <typeDescriptor><type name="Optional"/></typeDescriptor>
                        </plugin>
                    </plugins>
                </group>
            </optionalFileGroups>
        </installStep>
        <installStep name="Finish">
            <optionalFileGroups>
                <group name="Docs" type="SelectAll">
                    <plugins>
                        <plugin name="Readme">
                            <description/>
                            <typeDescriptor><type name="Optional"/></typeDescriptor>
                        </plugin>
                    </plugins>
                </group>
            </optionalFileGroups>
        </installStep>
    </installSteps>
</config>"#;

#[test]
fn test_hidden_page_is_skipped() {
    let config = parse_module_config(PAGED_CONFIG.as_bytes()).unwrap();
    let facts = FactSheet::new();
    let mut wizard = InstallWizard::new(&config, &facts);

    assert_eq!(wizard.state(), WizardState::Page(0));
    assert!(!wizard.is_page_visible(1));
    assert_eq!(wizard.next().unwrap(), WizardState::Page(2));
    assert!(wizard.is_last_page());
    assert_eq!(wizard.previous().unwrap(), WizardState::Page(0));
}

#[test]
fn test_selection_reveals_page() {
    let config = parse_module_config(PAGED_CONFIG.as_bytes()).unwrap();
    let facts = FactSheet::new();
    let mut wizard = InstallWizard::new(&config, &facts);

    wizard.toggle(0, 0, true).unwrap();
    assert!(wizard.is_page_visible(1));
    assert_eq!(wizard.next().unwrap(), WizardState::Page(1));
    assert!(!wizard.is_last_page());

    // Going back and deselecting hides the page again
    assert_eq!(wizard.previous().unwrap(), WizardState::Page(0));
    wizard.toggle(0, 0, false).unwrap();
    assert_eq!(wizard.next().unwrap(), WizardState::Page(2));

    let view = wizard.page_view().unwrap();
    assert_eq!(view.name, "Finish");
    assert!(view.is_last);
    assert!(view.groups[0].plugins[0].selected);
    assert_eq!(wizard.next().unwrap(), WizardState::Finished);
    assert!(wizard.next().is_err());
}
