//! The render-values text format used by the CLI driver.
//!
//! Each line is `path value`. Array elements are written as
//! `prefix[index].subpath value`; indices order the elements. The
//! strings `true` and `false` are stored as booleans, everything else
//! as a string.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::tree::{Array, TreeElement};

/// Parse `path value` lines into the given slot tree.
pub fn load_render_values(input: &str, root: &TreeElement) -> Result<()> {
    let mut lines = BTreeMap::new();
    for line in input.lines() {
        if line.is_empty() {
            continue;
        }
        let split = line
            .find(' ')
            .ok_or_else(|| Error::new(format!("invalid render line: {}", line)))?;
        lines.insert(line[..split].to_string(), line[split + 1..].to_string());
    }
    apply_render_values(&lines, root)
}

fn apply_render_values(lines: &BTreeMap<String, String>, node: &TreeElement) -> Result<()> {
    // array name -> index -> lines of that element
    let mut arrays: BTreeMap<String, BTreeMap<i64, BTreeMap<String, String>>> = BTreeMap::new();

    for (name, value) in lines {
        let open = name.find('[');
        let close = name.find(']');
        match (open, close) {
            (None, None) => {
                let slot = node.find(name);
                match value.as_str() {
                    "true" => slot.create_value(true),
                    "false" => slot.create_value(false),
                    other => slot.create_value(other),
                }
            }
            (Some(open), Some(close)) if open < close => {
                let array_name = &name[..open];
                let index_text = &name[open + 1..close];
                let index: i64 = index_text.parse().map_err(|_| {
                    Error::new(format!(
                        "bad cast '{}' to int, invalid render line: {} = {}",
                        index_text, name, value
                    ))
                })?;
                let rest = name[close + 1..].strip_prefix('.').unwrap_or(&name[close + 1..]);
                arrays
                    .entry(array_name.to_string())
                    .or_default()
                    .entry(index)
                    .or_default()
                    .insert(rest.to_string(), value.clone());
            }
            _ => {
                return Err(Error::new(format!(
                    "invalid render line: {} = {}",
                    name, value
                )))
            }
        }
    }

    for (array_name, elements) in arrays {
        let mut array = Array::new();
        for element_lines in elements.values() {
            apply_render_values(element_lines, &array.add())?;
        }
        node.find(&array_name).create_array(array);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_lines_store_strings_and_booleans() {
        let root = TreeElement::new();
        load_render_values(
            "user.name asdf\nuser.active true\nuser.banned false\nuser.note a b c\n",
            &root,
        )
        .unwrap();

        assert_eq!(root.find("user.name").value_output().unwrap(), "asdf");
        assert!(root.find("user.active").value_is_true().unwrap());
        assert!(!root.find("user.banned").value_is_true().unwrap());
        // the value is everything after the first space
        assert_eq!(root.find("user.note").value_output().unwrap(), "a b c");
    }

    #[test]
    fn array_lines_build_indexed_elements() {
        let root = TreeElement::new();
        load_render_values(
            "xs[1].name second\nxs[0].name first\nxs[0].level 3\n",
            &root,
        )
        .unwrap();

        let slot = root.find("xs");
        assert_eq!(slot.array_size().unwrap(), 2);
        slot.array_reset().unwrap();
        let first = slot.array_next().unwrap().unwrap();
        assert_eq!(first.find("name").value_output().unwrap(), "first");
        assert_eq!(first.find("level").value_output().unwrap(), "3");
        let second = slot.array_next().unwrap().unwrap();
        assert_eq!(second.find("name").value_output().unwrap(), "second");
    }

    #[test]
    fn nested_arrays_recurse() {
        let root = TreeElement::new();
        load_render_values("users[0].pets[0].name rex\nusers[0].pets[1].name tom\n", &root)
            .unwrap();

        let users = root.find("users");
        users.array_reset().unwrap();
        let user = users.array_next().unwrap().unwrap();
        let pets = user.find("pets");
        assert_eq!(pets.array_size().unwrap(), 2);
    }

    #[test]
    fn missing_space_is_invalid() {
        let root = TreeElement::new();
        let err = load_render_values("nospace\n", &root).unwrap_err();
        assert_eq!(err.message(), "invalid render line: nospace");
    }

    #[test]
    fn bad_index_is_invalid() {
        let root = TreeElement::new();
        let err = load_render_values("xs[abc].name x\n", &root).unwrap_err();
        assert!(err.message().starts_with("bad cast 'abc' to int"));
    }

    #[test]
    fn mismatched_brackets_are_invalid() {
        let root = TreeElement::new();
        let err = load_render_values("xs]0[.name x\n", &root).unwrap_err();
        assert!(err.message().starts_with("invalid render line:"));
    }
}
