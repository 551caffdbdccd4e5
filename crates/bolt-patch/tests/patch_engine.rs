//! End-to-end checks of the patch engine on realistic model output.

use bolt_patch::{
    apply_diff_patches, contains_diff_markers, extract_diff_blocks, parse_patch_blocks,
};

const APP_JSX: &str = "\
import React from 'react';

export default function App() {
  const title = 'Hello';
  return <h1>{title}</h1>;
}
";

#[test]
fn applies_model_authored_patch_with_surrounding_prose() {
    let reply = "\
I'll change the title and add an import.

<<<<<<< SEARCH
  const title = 'Hello';
=======
  const title = 'Hello, world';
>>>>>>> REPLACE

<<<<<<< SEARCH
=======
import './App.css';
>>>>>>> REPLACE

That's it!";

    assert!(contains_diff_markers(reply));
    assert_eq!(extract_diff_blocks(reply).len(), 2);

    let result = apply_diff_patches(APP_JSX, reply);
    assert!(result.has_changes);
    assert_eq!(
        result.modified_content,
        "\
import './App.css';
import React from 'react';

export default function App() {
  const title = 'Hello, world';
  return <h1>{title}</h1>;
}
"
    );
    // The first block touched line 4 of the original; the insertion then
    // reports its own range at the top without rewriting earlier ranges.
    assert_eq!(result.touched_line_ranges, vec![(4, 4), (1, 1)]);
}

#[test]
fn replaying_same_patch_is_a_no_op_once_applied() {
    let patch = "<<<<<<< SEARCH\nHello\n=======\nHowdy\n>>>>>>> REPLACE\n";
    let first = apply_diff_patches(APP_JSX, patch);
    assert!(first.has_changes);

    let second = apply_diff_patches(&first.modified_content, patch);
    assert!(!second.has_changes);
    assert_eq!(second.modified_content, first.modified_content);
}

#[test]
fn diff_result_serializes_ranges_as_pairs() {
    let result = apply_diff_patches(
        "foo\nbaz",
        "<<<<<<< SEARCH\nfoo\n=======\nbar\n>>>>>>> REPLACE",
    );
    let json = serde_json::to_value(&result).expect("serialize");
    assert_eq!(json["touched_line_ranges"], serde_json::json!([[1, 1]]));
    assert_eq!(json["has_changes"], serde_json::json!(true));
}

#[test]
fn parsed_blocks_keep_source_order() {
    let patch = "\
<<<<<<< SEARCH
b
=======
B
>>>>>>> REPLACE
<<<<<<< SEARCH
a
=======
A
>>>>>>> REPLACE";
    let blocks = parse_patch_blocks(patch);
    let searches: Vec<_> = blocks.iter().map(|b| b.search.as_str()).collect();
    assert_eq!(searches, ["b", "a"]);
}
