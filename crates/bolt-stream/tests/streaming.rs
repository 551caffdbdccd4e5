//! Feeding growing prefixes of a reply must end in the same state as feeding
//! the whole reply at once.

use bolt_stream::{
    ActionKind, Artifact, BlockClassifier, BlockKind, ParserEvent, ParserRegistry,
};

const REPLY: &str = r#"I'll scaffold a small Vite app.

<boltArtifact id="vite-app" title="Vite starter">
  <boltAction type="file" filePath="package.json">
{
  "name": "vite-app",
  "scripts": { "dev": "vite" }
}
  </boltAction>
  <boltAction type="file" filePath="src/main.js">
document.querySelector('#app').innerHTML = '<h1>héllo ✓</h1>';
  </boltAction>
  <boltAction type="shell">
npm install && npm run dev
  </boltAction>
</boltArtifact>

Open the preview once the dev server starts."#;

fn completed(events: &[ParserEvent]) -> Vec<Artifact> {
    events
        .iter()
        .filter_map(ParserEvent::completed_artifact)
        .cloned()
        .collect()
}

fn char_boundaries(text: &str) -> impl Iterator<Item = usize> + '_ {
    text.char_indices()
        .map(|(i, _)| i)
        .skip(1)
        .chain(std::iter::once(text.len()))
}

#[test]
fn growing_prefixes_match_single_shot_parse() {
    let mut registry = ParserRegistry::new();
    let mut whole_events = Vec::new();
    let whole_prose = registry.parse("whole", REPLY, &mut whole_events);

    let mut streamed_events = Vec::new();
    let mut streamed_prose = String::new();
    for end in char_boundaries(REPLY) {
        streamed_prose.push_str(&registry.parse("streamed", &REPLY[..end], &mut streamed_events));
    }

    assert_eq!(completed(&streamed_events), completed(&whole_events));
    assert_eq!(streamed_prose, whole_prose);

    let artifacts = completed(&whole_events);
    assert_eq!(artifacts.len(), 1);
    let kinds: Vec<ActionKind> = artifacts[0].actions.iter().map(|a| a.kind).collect();
    assert_eq!(kinds, [ActionKind::File, ActionKind::File, ActionKind::Shell]);
    assert!(artifacts[0].actions[1].content.contains("héllo ✓"));
    assert_eq!(artifacts[0].actions[2].content, "npm install && npm run dev");
}

#[test]
fn streamed_deltas_reassemble_raw_action_content() {
    let mut registry = ParserRegistry::new();
    let mut events = Vec::new();
    for end in (7..=REPLY.len()).step_by(7).filter(|&i| REPLY.is_char_boundary(i)) {
        registry.parse("m", &REPLY[..end], &mut events);
    }
    registry.parse("m", REPLY, &mut events);

    let shell_id = events
        .iter()
        .find_map(|event| match event {
            ParserEvent::ActionOpen { action, .. } if action.kind == ActionKind::Shell => {
                Some(action.id.clone())
            }
            _ => None,
        })
        .expect("shell action opened");
    let raw: String = events
        .iter()
        .filter_map(|event| match event {
            ParserEvent::ActionDelta {
                action_id, chunk, ..
            } if *action_id == shell_id => Some(chunk.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(raw.trim(), "npm install && npm run dev");
}

const MARKDOWN: &str = "Here's the setup.

`src/App.jsx`
```jsx
export default function App() {
  return <h1>Hi</h1>;
}
```

```css
body { margin: 0; }
```

Then run:

```bash
npm install
npm run dev
```
";

#[test]
fn classifier_never_repeats_a_block_across_growing_calls() {
    let mut classifier = BlockClassifier::new();
    let mut streamed = Vec::new();
    for end in char_boundaries(MARKDOWN) {
        streamed.extend(classifier.parse("m", &MARKDOWN[..end]));
    }

    let mut ids: Vec<&str> = streamed.iter().map(|b| b.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), streamed.len(), "a block id was emitted twice");

    let kinds: Vec<(BlockKind, Option<&str>)> = streamed
        .iter()
        .map(|b| (b.kind, b.file_path.as_deref()))
        .collect();
    assert_eq!(
        kinds,
        [
            (BlockKind::File, Some("src/App.jsx")),
            (BlockKind::File, Some("/styles.css")),
            (BlockKind::Command, None),
        ]
    );

    assert!(classifier.parse("m", MARKDOWN).is_empty());
}

#[test]
fn streamed_prose_instruction_yields_one_whole_file() {
    let text = "Create a file at notes.txt with the following content:\nbuy milk\n\nok";
    let mut classifier = BlockClassifier::new();
    let mut streamed = Vec::new();
    for end in char_boundaries(text) {
        streamed.extend(classifier.parse("m", &text[..end]));
    }
    streamed.extend(classifier.finish("m", text));

    assert_eq!(streamed.len(), 1);
    assert_eq!(streamed[0].kind, BlockKind::File);
    assert_eq!(streamed[0].file_path.as_deref(), Some("notes.txt"));
    assert_eq!(streamed[0].payload, "buy milk\n");
}
