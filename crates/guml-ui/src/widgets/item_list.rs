use std::rc::Rc;

use crate::error::RenderError;
use crate::value::Value;
use crate::widget::{StyleKind, Widget, WidgetClass};

#[derive(Debug)]
pub struct ItemListState {
    pub items: Vec<String>,
    /// `-1` when nothing is selected.
    pub selected: i64,
}

impl Default for ItemListState {
    fn default() -> Self {
        Self { items: Vec::new(), selected: -1 }
    }
}

fn item_texts(v: &Value) -> Result<Vec<String>, RenderError> {
    match v {
        Value::Null => Ok(Vec::new()),
        Value::List(list) => list.to_vec().iter().map(Value::to_text).collect(),
        other => Err(RenderError::type_error(format!("expected list, found {}", other.type_name()))),
    }
}

/// `ItemList`: a selectable list of text rows, filled from a list value.
pub fn item_list_class() -> Rc<WidgetClass> {
    WidgetClass::builder::<ItemListState>("ItemList")
        .property(
            "items",
            |s| Value::List(s.items.iter().map(String::as_str).collect()),
            |s, v| {
                s.items = item_texts(&v)?;
                if s.selected >= s.items.len() as i64 {
                    s.selected = -1;
                }
                Ok(())
            },
        )
        .property(
            "selected",
            |s| Value::Int(s.selected),
            |s, v| {
                s.selected = v.to_i64()?;
                Ok(())
            },
        )
        .event("item_selected")
        .style("font_color", StyleKind::Color)
        .style("selected", StyleKind::Style)
        .build()
}

/// Simulate a click on row `index`: updates `selected` and emits
/// `item_selected(index)`. Out-of-range rows are ignored.
pub fn select(item_list: &Widget, index: usize) -> Result<bool, RenderError> {
    let in_range = item_list.with_state(|s: &ItemListState| index < s.items.len()).unwrap_or(false);
    if !in_range {
        return Ok(false);
    }
    item_list.update_state("selected", |s: &mut ItemListState| s.selected = index as i64);
    item_list.emit("item_selected", &[Value::Int(index as i64)])?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::ObservableList;

    #[test]
    fn items_from_list() {
        let w = Widget::new(item_list_class());
        let list: ObservableList = ["a", "b"].into_iter().collect();
        w.set_property("items", Value::List(list)).unwrap();
        assert!(select(&w, 1).unwrap());
        assert!(!select(&w, 5).unwrap());
        assert_eq!(w.property("selected").unwrap(), Value::Int(1));
        w.set_property("items", Value::Null).unwrap();
        assert_eq!(w.property("selected").unwrap(), Value::Int(-1));
    }
}
