#[cfg(test)]
mod tests {
    use crate::commands::utils::{load_config, read_items};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_read_items_from_args() {
        let args = vec!["F001".to_string(), " F002 ".to_string()];
        assert_eq!(read_items(&args).unwrap(), vec!["F001", "F002"]);
    }

    #[test]
    fn test_read_items_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("codes.txt");
        fs::write(&path, "F001\n\n  F002\r\nF003\n").unwrap();

        let args = vec![format!("@{}", path.display()), "F004".to_string()];
        assert_eq!(
            read_items(&args).unwrap(),
            vec!["F001", "F002", "F003", "F004"]
        );
    }

    #[test]
    fn test_read_items_rejects_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.txt");
        fs::write(&path, "\n  \n").unwrap();

        assert!(read_items(&[format!("@{}", path.display())]).is_err());
        assert!(read_items(&[]).is_err());
    }

    #[test]
    fn test_read_items_missing_file() {
        let err = read_items(&["@/definitely/not/here.txt".to_string()]).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.txt"));
    }

    #[test]
    fn test_headless_override() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{"session": {"headless": false}}"#).unwrap();

        assert!(!load_config(Some(&path), false).unwrap().session.headless);
        assert!(load_config(Some(&path), true).unwrap().session.headless);
    }
}
