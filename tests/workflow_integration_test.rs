use autostep::config::Workflow;

#[test]
fn test_load_example_workflow() {
    let workflow_path = concat!(env!("CARGO_MANIFEST_DIR"), "/workflows/example.toml");
    let workflow = Workflow::from_file(workflow_path).expect("Failed to load workflow");

    assert_eq!(workflow.name(), "example");
    assert_eq!(workflow.description(), Some("数値を足し算・掛け算するサンプルワークフロー"));
    assert_eq!(workflow.version(), Some("1.0.0"));
    assert_eq!(workflow.provider(), "openai");
    assert_eq!(workflow.model(), Some("gpt-4o"));
    assert_eq!(workflow.max_attempts(), 3);
    assert_eq!(workflow.steps().len(), 2);

    let steps = workflow.steps();
    assert_eq!(steps[0].name(), "add_numbers");
    assert_eq!(steps[0].signature(), "add_numbers(a, b) -> table");
    assert!(steps[0].auto_implement());
    assert_eq!(steps[1].name(), "multiply_numbers");

    // 親ソースとして元の TOML テキストを保持している
    assert!(workflow.source().contains("multiply_numbers"));
}

#[test]
fn test_load_non_linear_workflow() {
    let workflow_path = concat!(env!("CARGO_MANIFEST_DIR"), "/workflows/non_linear.toml");
    let workflow = Workflow::from_file(workflow_path).expect("Failed to load workflow");

    assert_eq!(workflow.name(), "SimpleStepClassifier");
    let names: Vec<&str> = workflow.steps().iter().map(|s| s.name()).collect();
    assert_eq!(names, vec!["code_step", "llm_prompt_step", "workflow_step"]);
    assert!(workflow.steps().iter().all(|s| s.auto_implement()));
}

#[test]
fn test_workflow_roundtrip_with_real_file() {
    let workflow_path = concat!(env!("CARGO_MANIFEST_DIR"), "/workflows/example.toml");

    // Load workflow from file
    let original = Workflow::from_file(workflow_path).expect("Failed to load workflow");

    // Convert to string
    let toml_string = original.to_toml_string().expect("Failed to serialize");

    // Parse back from string
    let restored = Workflow::from_toml(&toml_string).expect("Failed to parse");

    // Verify they match
    assert_eq!(restored.name(), original.name());
    assert_eq!(restored.description(), original.description());
    assert_eq!(restored.version(), original.version());
    assert_eq!(restored.provider(), original.provider());
    assert_eq!(restored.steps_dir(), original.steps_dir());
    assert_eq!(restored.steps(), original.steps());
}

#[test]
fn test_to_file_and_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("copy.toml");

    let original = Workflow::from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/workflows/example.toml"))
        .expect("Failed to load workflow");
    original.to_file(&path).expect("Failed to write");

    let restored = Workflow::from_file(&path).expect("Failed to reload");
    assert_eq!(restored.steps(), original.steps());
}
