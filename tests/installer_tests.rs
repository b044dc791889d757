//! Tests for package loading and headless installation
//!
//! These tests verify:
//! - Opening extracted archives from disk
//! - Metadata from info.xml and name overrides
//! - Saving and replaying choices files
//! - Settings and fact sheets loaded from JSON

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use fomod_engine::archive;
use fomod_engine::manifest::GuessQuality;
use fomod_engine::{
    DirectoryTree, FactProvider, FactSheet, FileState, FomodError, FomodInstaller, GroupChoice,
    InstallChoices, InstallOutcome, InstallWizard, InstallerSettings, Package, StepChoice,
    WizardState, parse_module_config,
};

const INFO: &str = r#"<fomod>
    <Name>Better Skies</Name>
    <Author>Someone</Author>
    <Version>1.2.0</Version>
    <Id>4821</Id>
    <Website>https://example.invalid/skies</Website>
</fomod>"#;

const CONFIG: &str = r#"<config>
    <moduleName>Skies Installer</moduleName>
    <requiredInstallFiles>
        <file source="Core\skies.esp" destination="skies.esp"/>
    </requiredInstallFiles>
    <installSteps>
        <installStep name="Textures">
            <optionalFileGroups>
                <group name="Resolution" type="SelectExactlyOne">
                    <plugins>
                        <plugin name="2K">
                            <description>Smaller textures</description>
                            <image path="fomod\images\2k.png"/>
                            <files><folder source="2k" destination="textures"/></files>
                            <typeDescriptor><type name="Optional"/></typeDescriptor>
                        </plugin>
                        <plugin name="4K">
                            <description>Large textures</description>
                            <files><folder source="4k" destination="textures"/></files>
                            <typeDescriptor><type name="Optional"/></typeDescriptor>
                        </plugin>
                    </plugins>
                </group>
            </optionalFileGroups>
        </installStep>
    </installSteps>
</config>"#;

fn write(root: &Path, path: &str, content: &[u8]) {
    let full = root.join(path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(full, content).unwrap();
}

/// An extracted archive wrapped in a single top-level directory
fn extracted_archive() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "Skies/fomod/info.xml", INFO.as_bytes());
    write(root, "Skies/fomod/ModuleConfig.xml", CONFIG.as_bytes());
    write(root, "Skies/fomod/images/2k.png", b"png");
    write(root, "Skies/Core/skies.esp", b"plugin");
    write(root, "Skies/2k/sky.dds", b"2k");
    write(root, "Skies/4k/sky.dds", b"4k");
    write(root, "Skies/4k/clouds/cirrus.dds", b"4k");
    dir
}

// =============================================================================
// Package Loading Tests
// =============================================================================

#[test]
fn test_open_wrapped_archive() {
    let dir = extracted_archive();
    let package = Package::open(dir.path()).unwrap();

    assert_eq!(package.layout.fomod_dir, "Skies/fomod");
    assert_eq!(package.layout.data_root, "Skies");
    assert!(package.source.file("Core/skies.esp").is_some());
    assert!(package.source.directory("4k/clouds").is_some());

    let metadata = &package.manifest.metadata;
    assert_eq!(metadata.display_name(), "Better Skies");
    assert_eq!(metadata.name.quality(), GuessQuality::Meta);
    assert_eq!(metadata.author, "Someone");
    assert_eq!(metadata.version, "1.2.0");
    assert_eq!(metadata.id, Some(4821));
    assert_eq!(metadata.url, "https://example.invalid/skies");

    let plugin = &package.manifest.config.steps[0].groups[0].plugins[0];
    assert_eq!(plugin.image_path.as_deref(), Some("fomod/images/2k.png"));
}

#[test]
fn test_installer_files_listed_first() {
    let dir = extracted_archive();
    let tree = DirectoryTree::from_directory(dir.path()).unwrap();

    let files = archive::installer_files(&tree);
    assert_eq!(files[0], "Skies/fomod/info.xml");
    assert_eq!(files[1], "Skies/fomod/ModuleConfig.xml");
    assert!(files.contains(&"Skies/fomod/images/2k.png".to_string()));
    assert!(FomodInstaller::default().is_archive_supported(&tree));
}

#[test]
fn test_opened_package_source_is_supported() {
    let dir = extracted_archive();
    let package = Package::open(dir.path()).unwrap();

    assert!(FomodInstaller::default().is_archive_supported(&package.source));
    let files = archive::installer_files(&package.source);
    assert_eq!(files[0], "fomod/info.xml");
    assert_eq!(files[1], "fomod/ModuleConfig.xml");
}

#[test]
fn test_open_without_installer_fails() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "readme.txt", b"no installer here");
    write(dir.path(), "data/plugin.esp", b"plugin");

    let err = Package::open(dir.path()).unwrap_err();
    assert!(matches!(err, FomodError::ManifestParse { .. }));
}

#[test]
fn test_open_utf16_module_config() {
    let dir = TempDir::new().unwrap();
    let mut encoded = vec![0xFF, 0xFE];
    for unit in CONFIG.encode_utf16() {
        encoded.extend_from_slice(&unit.to_le_bytes());
    }
    write(dir.path(), "fomod/ModuleConfig.xml", &encoded);

    let package = Package::open(dir.path()).unwrap();
    assert_eq!(package.manifest.metadata.display_name(), "Skies Installer");
    assert_eq!(package.manifest.metadata.name.quality(), GuessQuality::Fallback);
    assert_eq!(package.layout.data_root, "");
}

// =============================================================================
// Headless Installation Tests
// =============================================================================

#[test]
fn test_install_default_choices() {
    let dir = extracted_archive();
    let package = Package::open(dir.path()).unwrap();

    let outcome = FomodInstaller::default()
        .install(package, &FactSheet::new(), &InstallChoices::new())
        .unwrap();
    let InstallOutcome::Success(report) = outcome else {
        panic!("expected a successful install");
    };

    assert_eq!(report.tree.file("skies.esp").unwrap().source, "Core/skies.esp");
    assert_eq!(report.tree.file("textures/sky.dds").unwrap().source, "2k/sky.dds");
    assert!(report.tree.directory("textures/clouds").is_none());
    assert_eq!(report.choices.steps[0].groups[0].plugins, vec!["2K"]);
}

#[test]
fn test_saved_choices_replay() {
    let dir = extracted_archive();
    let saved = TempDir::new().unwrap();
    let choices_path = saved.path().join("choices.json");

    let mut choices = InstallChoices::new();
    choices.name = Some("Skies (4K)".to_string());
    choices.steps.push(StepChoice {
        name: "Textures".to_string(),
        groups: vec![GroupChoice {
            name: "Resolution".to_string(),
            plugins: vec!["4K".to_string()],
        }],
    });
    choices.save_to_file(&choices_path).unwrap();

    let replayed = InstallChoices::load_from_file(&choices_path).unwrap();
    replayed.validate().unwrap();

    let package = Package::open(dir.path()).unwrap();
    let InstallOutcome::Success(report) = FomodInstaller::default()
        .install(package, &FactSheet::new(), &replayed)
        .unwrap()
    else {
        panic!("expected a successful install");
    };

    assert_eq!(report.metadata.display_name(), "Skies (4K)");
    assert_eq!(report.tree.file("textures/sky.dds").unwrap().source, "4k/sky.dds");
    assert_eq!(
        report.tree.file("textures/clouds/cirrus.dds").unwrap().source,
        "4k/clouds/cirrus.dds"
    );
    assert_eq!(report.choices, replayed);
}

#[test]
fn test_unknown_step_choice_is_ignored() {
    let dir = extracted_archive();
    let mut choices = InstallChoices::new();
    choices.steps.push(StepChoice {
        name: "Nonexistent".to_string(),
        groups: Vec::new(),
    });

    let package = Package::open(dir.path()).unwrap();
    let outcome = FomodInstaller::default()
        .install(package, &FactSheet::new(), &choices)
        .unwrap();
    assert!(matches!(outcome, InstallOutcome::Success(_)));
}

#[test]
fn test_manual_choice_skips_merge() {
    let dir = extracted_archive();
    let choices = InstallChoices {
        manual: true,
        ..Default::default()
    };

    let package = Package::open(dir.path()).unwrap();
    let outcome = FomodInstaller::default()
        .install(package, &FactSheet::new(), &choices)
        .unwrap();
    assert!(matches!(outcome, InstallOutcome::ManualRequested { ref name } if name == "Better Skies"));
}

// =============================================================================
// Settings and Facts Files
// =============================================================================

#[test]
fn test_settings_file_controls_priority_and_lookup() {
    let dir = TempDir::new().unwrap();
    let settings_path = dir.path().join("settings.json");
    fs::write(&settings_path, r#"{"prefer": false, "use_any_file": true}"#).unwrap();

    let settings = InstallerSettings::load_from_file(&settings_path).unwrap();
    assert!(settings.enabled);
    assert!(settings.use_any_file);
    assert_eq!(FomodInstaller::new(settings.clone()).priority(), 90);

    let facts_path = dir.path().join("facts.json");
    fs::write(&facts_path, r#"{"data_files": ["Textures\\Sky.dds"]}"#).unwrap();
    let facts = FactSheet::load_from_file(&facts_path)
        .unwrap()
        .with_settings(&settings);
    assert_eq!(facts.file_state("textures/sky.dds"), FileState::Active);
    assert_eq!(facts.file_state("textures/rain.dds"), FileState::Missing);
}

#[test]
fn test_wizard_state_after_cancel() {
    let config = parse_module_config(CONFIG.as_bytes()).unwrap();
    let facts = FactSheet::new();
    let mut wizard = InstallWizard::new(&config, &facts);
    wizard.cancel();
    assert_eq!(wizard.state(), WizardState::Cancelled);

    let outcome =
        fomod_engine::installer::finish(Default::default(), &wizard, DirectoryTree::new()).unwrap();
    assert!(matches!(outcome, InstallOutcome::Cancelled));
}
