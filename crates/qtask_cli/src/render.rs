//! Plain-text task rendering.

use qtask_core::Task;

pub fn print_list(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks.");
        return;
    }
    for task in tasks {
        print_line(task);
    }
}

pub fn print_line(task: &Task) {
    println!("{}", format_line(task));
}

pub fn print_detail(task: &Task) {
    println!("{} {}", task.priority_emoji(), task.title());
    println!("  id:        {}", task.id());
    println!("  category:  {} {}", task.category_emoji(), task.category());
    println!("  priority:  {}", task.priority());
    println!("  created:   {}", task.formatted_created_date());
    if task.is_completed() {
        println!("  completed: {}", task.formatted_completed_date());
    }
    if !task.description().is_empty() {
        println!();
        println!("  {}", task.description());
    }
    println!();
    println!("  {}", task.summary());
}

fn format_line(task: &Task) -> String {
    let mark = if task.is_completed() { "[x]" } else { "[ ]" };
    format!(
        "{mark} {} {} {}  ({})  {}",
        task.priority_emoji(),
        task.category_emoji(),
        task.title(),
        task.relative_created_time(),
        task.id()
    )
}
