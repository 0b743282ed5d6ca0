//! Texture path resolution for imported materials.

/// Directory of a model file path, as used for relative texture lookups.
///
/// `"assets/models/hero.fbx"` -> `"assets/models"`, `"hero.fbx"` -> `"."`,
/// `"/hero.fbx"` -> `"/"`.
pub fn model_directory(model_path: &str) -> String {
    match model_path.rfind('/') {
        None => ".".to_string(),
        Some(0) => "/".to_string(),
        Some(index) => model_path[..index].to_string(),
    }
}

/// Parses an embedded texture reference of the form `*N`.
pub fn embedded_texture_index(texture_path: &str) -> Option<usize> {
    let digits = texture_path.strip_prefix('*')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Strips a leading `.\` and converts backslashes to forward slashes.
pub fn normalize_texture_path(texture_path: &str) -> String {
    let trimmed = texture_path.strip_prefix(".\\").unwrap_or(texture_path);
    trimmed.replace('\\', "/")
}

/// File locations tried in order for a material texture.
pub fn texture_candidates(directory: &str, texture_path: &str, texture_root: &str) -> Vec<String> {
    let path = normalize_texture_path(texture_path);
    let file_name = match path.rfind('/') {
        Some(index) => &path[index + 1..],
        None => path.as_str(),
    };

    vec![
        join(directory, &path),
        join(directory, file_name),
        join(texture_root, file_name),
    ]
}

fn join(directory: &str, file: &str) -> String {
    if directory.ends_with('/') {
        format!("{directory}{file}")
    } else {
        format!("{directory}/{file}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_of_model_paths() {
        assert_eq!(model_directory("assets/models/hero.dae"), "assets/models");
        assert_eq!(model_directory("hero.dae"), ".");
        assert_eq!(model_directory("/hero.dae"), "/");
    }

    #[test]
    fn candidates_follow_lookup_order() {
        let candidates = texture_candidates("assets/models", "textures/x.png", "/");
        assert_eq!(
            candidates,
            vec![
                "assets/models/textures/x.png".to_string(),
                "assets/models/x.png".to_string(),
                "/x.png".to_string(),
            ]
        );
    }

    #[test]
    fn windows_style_paths_are_normalized() {
        let candidates = texture_candidates(".", ".\\maps\\skin.png", "/textures");
        assert_eq!(candidates[0], "./maps/skin.png");
        assert_eq!(candidates[1], "./skin.png");
        assert_eq!(candidates[2], "/textures/skin.png");
    }

    #[test]
    fn backslashes_become_forward_slashes() {
        assert_eq!(normalize_texture_path(".\\maps\\skin.png"), "maps/skin.png");
        assert_eq!(normalize_texture_path("maps\\body\\skin.png"), "maps/body/skin.png");
        assert_eq!(normalize_texture_path("maps/skin.png"), "maps/skin.png");
    }

    #[test]
    fn embedded_references() {
        assert_eq!(embedded_texture_index("*0"), Some(0));
        assert_eq!(embedded_texture_index("*12"), Some(12));
        assert_eq!(embedded_texture_index("*"), None);
        assert_eq!(embedded_texture_index("*1a"), None);
        assert_eq!(embedded_texture_index("skin.png"), None);
    }
}
